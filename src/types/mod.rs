pub mod date_bound;
