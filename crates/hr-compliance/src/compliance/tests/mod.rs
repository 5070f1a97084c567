mod common;
mod runner;
