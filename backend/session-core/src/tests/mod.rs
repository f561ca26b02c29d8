mod certificate;
mod correlator;
mod driver;
