use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    /// 設定ファイル (JSON)。省略時は ~/.dcrms/dcrms.json があれば読む
    #[clap(short = 'C', long = "config", value_parser)]
    pub config: Option<PathBuf>,

    /// ウォレットの証明書 (既定: ~/.dcrwallet/rpc.cert)
    #[clap(long, value_parser)]
    pub cert: Option<PathBuf>,

    /// ウォレットの JSON-RPC URL (既定: https://localhost:9110)
    #[clap(long)]
    pub wallet: Option<String>,

    /// RPCユーザー (未指定なら dcrwallet.conf から読む)
    #[clap(long)]
    pub user: Option<String>,

    /// RPCパスワード (未指定なら dcrwallet.conf から読む)
    #[clap(long)]
    pub pass: Option<String>,

    /// 使用するネットワーク ("mainnet", "testnet3")
    #[clap(long)]
    pub net: Option<String>,

    /// ログフィルタ (既定: dcrms=info)
    #[clap(long)]
    pub log: Option<String>,

    /// データサービスへのHTTPタイムアウト (秒)
    #[clap(long)]
    pub timeout: Option<u64>,

    /// アクション: getmultisigbalance, getwalletbalance, getnewkey, createmultisigaddress,
    /// sendtomultisig, createmultisigtx, signmultisigtx, broadcastmultisigtx, multisiginfo,
    /// importredeemscript, deserializetx, sweepmultisig
    pub action: String,

    /// key=value 形式のアクション引数
    pub args: Vec<String>,
}
