use std::process::ExitCode;

use wordcount_logging::wc_error;

mod service;

use service::settings::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };
    service::logging::initialize(settings.log_level, settings.log_file.as_deref());

    match service::run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            wc_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
