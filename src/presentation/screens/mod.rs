pub mod record;
pub mod run;
pub mod scan;
pub mod start;
pub mod train;
