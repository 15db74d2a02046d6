// Connect Demo - main.rs
// Walks a user through establishing a session, signing a transaction and
// ending the session against a running connect server.
use std::path::{Path, PathBuf};
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};

use common::{setup_tracing, ConnectConfig, DappInfo};
use connect_client::{ConnectClient, ConnectError, RawTransaction, SignedTransactionBytes};

type Input = Lines<BufReader<Stdin>>;

/// Ask a yes/no question, where an empty answer means yes
async fn confirm(input: &mut Input, question: &str) -> io::Result<bool> {
    loop {
        println!("{} (Yes/no)", question);
        let answer = match input.next_line().await? {
            Some(line) => line.trim().to_lowercase(),
            None => return Ok(false),
        };

        match answer.as_str() {
            "" | "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}

async fn read_transaction(path: &Path) -> Result<RawTransaction, String> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    let bytes = base64::decode(contents.trim()).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(RawTransaction(bytes))
}

async fn end(client: &ConnectClient) {
    println!("-> Ending session...");
    if let Err(e) = client.end_session(true).await {
        tracing::error!("Failed to end session: {}", e);
    }

    println!("-> Removing dApp connect key pair...");
    if let Err(e) = client.remove_connect_key_pair(false).await {
        tracing::error!("Failed to remove connect key pair: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<(), ConnectError> {
    // Setup tracing
    setup_tracing();

    // Load configuration
    let config = ConnectConfig::from_env();
    // Optional file holding a base64 encoded unsigned transaction
    let txn_file = std::env::args().nth(1).map(PathBuf::from);

    tracing::info!("Using connect server at {}", config.server_url);

    let client = ConnectClient::builder(
        DappInfo::new("Rust Connect Client Example")
            .with_desc("An example program demonstrating the use of the Rust connect client"),
    )
    .config(config)
    .on_confirmation_code(|code| {
        println!();
        println!("   Confirmation code: {}", code);
        println!("   Enter this code in the wallet to approve the session.");
        println!();
    })
    .build()?;

    println!("NOTICE: Log into a wallet and turn on its dApp connect server");
    println!("-> Loading connect key pair...");
    let connect_id = client.setup().await?;
    println!("-> Connect ID: {}", connect_id);

    let mut input = BufReader::new(io::stdin()).lines();
    if !confirm(&mut input, "Continue?").await.unwrap_or(false) {
        return Ok(());
    }

    println!("-> Contacting dApp connect server...");
    let session = match client.establish_session().await {
        Ok(session) => session,
        Err(e) => {
            println!("-> Failed to create session: {}", e);
            return Err(e);
        }
    };
    println!("-> Session established, expires {}", session.exp);

    let Some(addr) = session.addrs.first() else {
        println!("-> No address connected in session");
        end(&client).await;
        return Ok(());
    };
    println!("-> You are connected to: {}", addr);

    match &txn_file {
        Some(path) => {
            if confirm(&mut input, "Sign a transaction?").await.unwrap_or(false) {
                match read_transaction(path).await {
                    Ok(txn) => {
                        let waiting = || println!("-> Waiting for approval in the wallet...");
                        match client
                            .sign_transaction::<_, SignedTransactionBytes>(&txn, Some(addr.as_str()), Some(&waiting))
                            .await
                        {
                            Ok(signed) => {
                                println!("-> Transaction signed ({} bytes)", signed.len());
                                println!("{}", base64::encode(signed.as_bytes()));
                            }
                            Err(e) => println!("-> Failed to sign transaction: {}", e),
                        }
                    }
                    Err(e) => println!("-> Could not read transaction: {}", e),
                }
            }
        }
        None => println!("-> Pass a file with a base64 encoded transaction to try signing"),
    }

    end(&client).await;
    Ok(())
}
