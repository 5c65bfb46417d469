mod harness;
mod scope;
