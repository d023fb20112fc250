pub mod aggregator;
pub mod budget_service;
pub mod calendar_service;
pub mod dashboard_service;
