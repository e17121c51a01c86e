pub mod bar;
pub mod bar_series;
pub mod period;
pub mod request_params;
