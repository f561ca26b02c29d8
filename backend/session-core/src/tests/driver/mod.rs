mod discovery;
mod process;
mod transcript;
