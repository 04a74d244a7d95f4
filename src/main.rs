use std::io;
use std::path::PathBuf;

use clap::Parser;

use dcrms::actions::{self, Action, Args, Context};
use dcrms::cli::CliArgs;
use dcrms::config::{DEFAULT_LOG_FILTER, Settings};
use dcrms::error::AppError;
use dcrms::explorer::ExplorerClient;
use dcrms::wallet::WalletRpcClient;

fn init_logging(filters: Option<&str>) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER),
    );
    if let Some(filters) = filters {
        builder.parse_filters(filters);
    }
    builder.init();
}

fn run() -> Result<(), AppError> {
    let cli = CliArgs::parse();

    let action: Action = cli.action.parse()?;
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let settings = Settings::load(&cli, home.as_deref(), action.uses_wallet())?;

    init_logging(settings.log.as_deref());
    log::info!(
        "アプリケーションを開始します。アクション: {:?}, ネットワーク: {}",
        action,
        settings.net
    );
    log::debug!(
        "ウォレット: {}, HTTPタイムアウト: {:?}",
        settings.wallet_url,
        settings.http_timeout
    );

    let args = Args::parse(&cli.args)?;

    let chain = ExplorerClient::new(settings.net.params(), settings.http_timeout)?;
    let wallet = WalletRpcClient::new(
        settings.wallet_url.clone(),
        settings.user.clone(),
        settings.pass.clone(),
        settings.ca_pem.clone(),
        settings.wallet_timeout,
    );
    let ctx = Context {
        wallet: &wallet,
        chain: &chain,
        net: settings.net,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    actions::run(&ctx, action, &args, &mut out)?;

    log::info!("処理が正常に完了しました。");
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        log::debug!("{:?}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
