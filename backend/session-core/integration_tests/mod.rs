mod certificate;
mod config;
mod driver;
mod helpers;
mod output;
mod session;
mod supervisor;
