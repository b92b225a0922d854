use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::{Cursor, Read};
use tracing::info;
use tracing_subscriber::EnvFilter;

use btc_wire_keys::hd::{self, DerivationPath, DeterministicHierarchy, ExtendedKey};
use btc_wire_keys::wire::types::{NetAddr, Services};
use btc_wire_keys::wire::{self, Message, Network, WireCodec, WireError};

#[derive(Parser)]
#[command(name = "btc-cli", about = "Decode and build Bitcoin P2P frames, derive BIP32 keys")]
struct Cli {
    #[arg(long, value_enum, default_value_t = Network::Mainnet, env = "BTC_NETWORK")]
    network: Network,

    #[arg(long, default_value_t = wire::PROTOCOL_VERSION)]
    protocol_version: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode every frame in a hex string, or in raw bytes read from stdin.
    Decode {
        #[arg(long)]
        hex: Option<String>,
    },
    /// Print a framed message as hex.
    Encode {
        #[command(subcommand)]
        message: EncodeCommand,
    },
    /// Derive the key at a path from a hex seed.
    Derive {
        #[arg(long)]
        seed: String,
        #[arg(long, default_value = "M")]
        path: String,
    },
    /// Hand out fresh children below a parent path.
    Next {
        #[arg(long)]
        seed: String,
        #[arg(long, default_value = "M")]
        parent: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
        #[arg(long)]
        hardened: bool,
    },
}

#[derive(Subcommand)]
enum EncodeCommand {
    Version {
        #[arg(long, default_value = "/btc-cli:0.1.0/")]
        user_agent: String,
        #[arg(long, default_value_t = 0)]
        start_height: i32,
    },
    Verack,
    Ping {
        #[arg(long)]
        nonce: u64,
    },
    GetHeaders {
        /// Block hashes in display (big-endian) order; defaults to genesis.
        #[arg(long)]
        locator: Vec<String>,
    },
    GetData {
        #[arg(long)]
        block: Vec<String>,
    },
    /// Frame an arbitrary command with a hex payload.
    Raw {
        #[arg(long)]
        command: String,
        #[arg(long, default_value = "")]
        payload: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let codec = WireCodec::new(cli.network).with_protocol_version(cli.protocol_version);

    match cli.command {
        Commands::Decode { hex } => decode(codec, hex)?,
        Commands::Encode { message } => encode(codec, message)?,
        Commands::Derive { seed, path } => derive(cli.network, &seed, &path)?,
        Commands::Next {
            seed,
            parent,
            count,
            hardened,
        } => next(cli.network, &seed, &parent, count, hardened)?,
    }

    Ok(())
}

fn decode(codec: WireCodec, hex_frames: Option<String>) -> Result<(), Box<dyn Error>> {
    let bytes = match hex_frames {
        Some(h) => hex::decode(h.trim())?,
        None => {
            let mut buf = vec![];
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let mut cursor = Cursor::new(bytes);
    let mut frames = 0usize;
    loop {
        match codec.deserialize(&mut cursor) {
            Ok(msg) => {
                frames += 1;
                println!("{msg:#?}");
            }
            Err(WireError::InsufficientData) => break,
            Err(e) => return Err(Box::new(e)),
        }
    }

    info!(frames, network = %codec.network(), "decoded input");
    Ok(())
}

/// Parses a display-order hash into wire order.
fn parse_hash(display: &str) -> Result<[u8; 32], Box<dyn Error>> {
    let mut hash: [u8; 32] = hex::decode(display)?
        .try_into()
        .map_err(|_| "hash must be 32 bytes")?;
    hash.reverse();
    Ok(hash)
}

fn encode(codec: WireCodec, message: EncodeCommand) -> Result<(), Box<dyn Error>> {
    let mut frame = vec![];

    let msg = match message {
        EncodeCommand::Raw { command, payload } => {
            codec.serialize_raw(&command, &hex::decode(payload)?, &mut frame)?;
            println!("{}", hex::encode(frame));
            return Ok(());
        }
        EncodeCommand::Version {
            user_agent,
            start_height,
        } => wire::payload::build_version(
            codec.protocol_version(),
            Services::NONE,
            NetAddr::unspecified(),
            &user_agent,
            start_height,
        ),
        EncodeCommand::Verack => Message::Verack,
        EncodeCommand::Ping { nonce } => Message::Ping(Some(nonce)),
        EncodeCommand::GetHeaders { locator } => {
            let locator = if locator.is_empty() {
                vec![wire::constants::GENESIS_BLOCK_HASH_MAINNET]
            } else {
                locator
                    .iter()
                    .map(|h| parse_hash(h))
                    .collect::<Result<Vec<_>, _>>()?
            };
            wire::payload::build_getheaders(codec.protocol_version(), &locator)
        }
        EncodeCommand::GetData { block } => {
            let hashes = block
                .iter()
                .map(|h| parse_hash(h))
                .collect::<Result<Vec<_>, _>>()?;
            wire::payload::build_getdata_blocks(&hashes, true)
        }
    };

    codec.serialize(&msg, &mut frame)?;
    println!("{}", hex::encode(frame));
    Ok(())
}

fn print_key(key: &ExtendedKey, network: Network) -> Result<(), Box<dyn Error>> {
    println!("path:        {}", key.path());
    println!("fingerprint: {}", hex::encode(key.fingerprint()));
    println!("public key:  {}", hex::encode(key.public_key_bytes()));
    println!("xpub:        {}", key.to_xpub(network));
    if !key.is_watching() {
        println!("xprv:        {}", key.to_xprv(network)?);
    }
    Ok(())
}

fn derive(network: Network, seed_hex: &str, path: &str) -> Result<(), Box<dyn Error>> {
    let seed = zeroize::Zeroizing::new(hex::decode(seed_hex)?);
    let path: DerivationPath = path.parse()?;

    let master = hd::derive_master_key(&seed)?;
    let key = hd::derive_path(&master, &path)?;
    print_key(&key, network)
}

fn next(
    network: Network,
    seed_hex: &str,
    parent: &str,
    count: u32,
    hardened: bool,
) -> Result<(), Box<dyn Error>> {
    let seed = zeroize::Zeroizing::new(hex::decode(seed_hex)?);
    let parent: DerivationPath = parent.parse()?;

    let hierarchy = DeterministicHierarchy::new(hd::derive_master_key(&seed)?);
    for _ in 0..count {
        let key = hierarchy.derive_next_child(&parent, false, true, hardened)?;
        print_key(&key, network)?;
        println!();
    }
    info!(cached = hierarchy.len(), "hierarchy size");
    Ok(())
}
