pub mod batch;
pub mod config;
pub mod correct;
pub mod detect;
pub mod info;
pub mod matching;
