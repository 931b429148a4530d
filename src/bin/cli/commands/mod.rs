pub mod practice;
pub mod sync;
pub mod words;
