use ::config::{Config, File, FileFormat};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::CliArgs;
use crate::error::{AppError, AppResult};
use crate::explorer::DEFAULT_HTTP_TIMEOUT;
use crate::types::Network;

pub const DEFAULT_LOG_FILTER: &str = "dcrms=info";
const DEFAULT_NET: &str = "mainnet";
const WALLET_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// 設定ファイル (JSON) にコマンドライン指定を重ねた値
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigValues {
    #[serde(default)]
    pub wallet: Option<String>,
    #[serde(default)]
    pub cert: Option<PathBuf>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    #[serde(default)]
    pub net: Option<String>,
    #[serde(default)]
    pub log: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// 設定ファイルを読み、コマンドラインの値で上書きする。
/// `required` が偽ならファイルがなくてもよい。
pub fn layered_config(cli: &CliArgs, file: Option<(&Path, bool)>) -> AppResult<ConfigValues> {
    let mut builder = Config::builder().set_default("net", DEFAULT_NET)?;
    if let Some((path, required)) = file {
        log::debug!("設定ファイル: {:?}", path);
        builder = builder.add_source(File::from(path).format(FileFormat::Json).required(required));
    }
    let cert = cli.cert.as_ref().map(|p| p.to_string_lossy().into_owned());
    let config = builder
        .set_override_option("wallet", cli.wallet.clone())?
        .set_override_option("cert", cert)?
        .set_override_option("user", cli.user.clone())?
        .set_override_option("pass", cli.pass.clone())?
        .set_override_option("net", cli.net.clone())?
        .set_override_option("log", cli.log.clone())?
        .set_override_option("timeout_secs", cli.timeout)?
        .build()
        .and_then(|c| c.try_deserialize());
    config.map_err(|e| AppError::ConfigParse {
        file_path: file.map(|(p, _)| p.to_path_buf()).unwrap_or_default(),
        source: e,
    })
}

#[derive(Deserialize, Debug, Default)]
struct DcrwalletConf {
    #[serde(default, rename = "application options", alias = "Application Options")]
    application_options: DcrwalletOptions,
}

#[derive(Deserialize, Debug, Default)]
struct DcrwalletOptions {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// dcrwallet.conf の `[Application Options]` から username / password を読む
pub fn read_dcrwallet_credentials(path: &Path) -> AppResult<(Option<String>, Option<String>)> {
    let conf: DcrwalletConf = Config::builder()
        .add_source(File::from(path).format(FileFormat::Ini))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| {
            AppError::Config(format!("user/pass 用の設定ファイルを開けません ({:?}): {}", path, e))
        })?;
    let opts = conf.application_options;
    Ok((opts.username, opts.password))
}

/// 実行に必要な設定をすべて解決したもの
#[derive(Debug, Clone)]
pub struct Settings {
    pub net: Network,
    pub wallet_url: String,
    pub user: String,
    pub pass: String,
    pub ca_pem: Vec<u8>,
    pub log: Option<String>,
    pub http_timeout: Duration,
    pub wallet_timeout: Duration,
}

/// ~/.<name>
pub fn app_dir(home: &Path, name: &str) -> PathBuf {
    home.join(format!(".{}", name))
}

/// `wss://host:port/ws` 形式の指定を JSON-RPC の HTTPS エンドポイントに直す
pub fn rpc_http_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    let url = url.strip_suffix("/ws").unwrap_or(url);
    if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        url.to_string()
    }
}

impl Settings {
    /// 重ねた設定値から、既定値と dcrwallet の設定を補って解決する。
    ///
    /// `require_wallet` が偽なら、認証情報と証明書がなくてもよい
    /// (ウォレットを使わないアクション向け)。
    pub fn resolve(
        values: ConfigValues,
        home: Option<&Path>,
        require_wallet: bool,
    ) -> AppResult<Self> {
        let net: Network = values.net.as_deref().unwrap_or(DEFAULT_NET).parse()?;

        let wallet_url = values
            .wallet
            .map(|u| rpc_http_url(&u))
            .unwrap_or_else(|| net.params().default_wallet_url.to_string());

        let mut user = values.user;
        let mut pass = values.pass;
        let dcrwallet_dir = home.map(|h| app_dir(h, "dcrwallet"));

        if require_wallet && (user.is_none() || pass.is_none()) {
            let conf = dcrwallet_dir
                .as_ref()
                .map(|d| d.join("dcrwallet.conf"))
                .ok_or_else(|| AppError::Config("ホームディレクトリが分かりません".to_string()))?;
            let (conf_user, conf_pass) = read_dcrwallet_credentials(&conf)?;
            user = user.or(conf_user);
            pass = pass.or(conf_pass);
        }
        if require_wallet && (user.is_none() || pass.is_none()) {
            return Err(AppError::Config(
                "user または pass が未指定で、dcrwallet の設定ファイルにもありません".to_string(),
            ));
        }

        let cert = values.cert.or_else(|| dcrwallet_dir.map(|d| d.join("rpc.cert")));
        let ca_pem = match cert {
            Some(path) if require_wallet => fs::read(&path).map_err(|e| {
                AppError::Config(format!("ウォレット証明書を読み込めません ({:?}): {}", path, e))
            })?,
            None if require_wallet => {
                return Err(AppError::Config("ウォレット証明書が指定されていません".to_string()));
            }
            _ => Vec::new(),
        };

        let http_timeout = values
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);

        Ok(Settings {
            net,
            wallet_url,
            user: user.unwrap_or_default(),
            pass: pass.unwrap_or_default(),
            ca_pem,
            log: values.log,
            http_timeout,
            wallet_timeout: WALLET_CALL_TIMEOUT,
        })
    }

    /// `-C` で指定された設定ファイル (なければ ~/.dcrms/dcrms.json があれば) と
    /// コマンドラインを重ねて `resolve` する
    pub fn load(cli: &CliArgs, home: Option<&Path>, require_wallet: bool) -> AppResult<Self> {
        let default_file = home.map(|h| app_dir(h, "dcrms").join("dcrms.json"));
        let file = match (&cli.config, &default_file) {
            (Some(path), _) => Some((path.as_path(), true)),
            (None, Some(path)) => Some((path.as_path(), false)),
            (None, None) => None,
        };
        let values = layered_config(cli, file)?;
        Self::resolve(values, home, require_wallet)
    }
}
