pub mod common;

mod single_flight_refresh;
