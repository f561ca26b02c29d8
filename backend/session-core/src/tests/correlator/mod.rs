mod commands;
mod parse;
