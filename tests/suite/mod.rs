mod persistence;
mod pipeline;
