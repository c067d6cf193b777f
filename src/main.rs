use std::process::ExitCode;

use db2drive_lib::cli::Cli;
use db2drive_lib::config::EffectiveConfig;
use db2drive_lib::dump::Mysqldump;
use db2drive_lib::environment::check_tmp_dir;
use db2drive_lib::pipeline::Pipeline;
use db2drive_lib::upload::Gdrive;

use clap::Parser;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // init logger
    let mut env_logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = cli.verbose {
        env_logger.filter_level(level);
    }
    env_logger.try_init().expect("env_logger should not fail");

    let config = match EffectiveConfig::resolve(&cli.config, cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            log::error!(target: "config", "{e}");
            return ExitCode::FAILURE;
        }
    };

    let gdrive = match Gdrive::with_config(&config) {
        Ok(gdrive) => gdrive,
        Err(e) => {
            log::error!(target: "environment", "{e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.dry_run {
        log::warn!("Running in dry-run mode");
        if let Err(e) = check_tmp_dir(&config.tmp_path) {
            log::error!(target: "environment", "{e}");
            return ExitCode::FAILURE;
        }
        for database in &config.databases {
            log::info!(
                "Would dump {database} from {}:{} ({} compression) and upload it using {}",
                config.connection.host,
                config.connection.port,
                config.compression,
                gdrive.binary().display(),
            );
        }
        return ExitCode::SUCCESS;
    }

    let pipeline = Pipeline::new(&config, Mysqldump::with_config(&config), gdrive);
    match pipeline.run() {
        Ok(report) => {
            let code = report.exit_code();
            if code != 0 {
                log::error!("Run finished with exit code {code}");
            }
            ExitCode::from(code)
        }
        Err(e) => {
            log::error!("Run aborted: {e}");
            ExitCode::FAILURE
        }
    }
}
