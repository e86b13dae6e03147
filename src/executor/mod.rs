mod dap_runner;

pub(crate) use dap_runner::run_worker;
