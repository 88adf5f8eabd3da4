pub mod nominations;
