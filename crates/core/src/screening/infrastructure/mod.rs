pub mod append_log_writer;
pub mod output_sink;
