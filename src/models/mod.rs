pub mod budget;
pub mod calendar;
pub mod dashboard;
pub mod interval;
pub mod period;
