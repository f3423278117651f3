//! Development server binary.
//!
//! Wires the in-memory stores behind the transport and serves the
//! WebSocket endpoint. The token check is a development stand-in: a token
//! of the form `user_id:username` is accepted as that identity and a demo
//! wallet is funded on first sight. Production deployments replace
//! [`AuthProvider`] with real JWT validation and the stores with shared
//! backends.

use std::sync::Arc;

use log::info;
use tonkrs::transport::{AppState, AuthProvider, AuthedUser, router};
use tonkrs::{GameServer, MemoryBank, MemoryStore, Table, TableOptions, WalletStore};

/// Demo balance funded into wallets created by [`DevAuth`].
const DEV_STARTING_BALANCE: u64 = 1_000;

/// Development token validation: `user_id:username`.
struct DevAuth {
    bank: Arc<MemoryBank>,
}

impl AuthProvider for DevAuth {
    fn validate(&self, token: &str) -> Option<AuthedUser> {
        let (user_id, username) = token.split_once(':')?;
        if user_id.is_empty() || username.is_empty() {
            return None;
        }
        self.bank.create_wallet(user_id, DEV_STARTING_BALANCE);
        Some(AuthedUser {
            user_id: user_id.to_string(),
            username: username.to_string(),
        })
    }
}

fn seed_tables() -> Vec<Table> {
    vec![
        Table::new("low-1", "Low Stakes", 10),
        Table::new("mid-1", "Mid Stakes", 25),
        Table::new("high-1", "High Stakes", 50),
    ]
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let options = TableOptions::default();
    let store = Arc::new(MemoryStore::new());
    let bank = Arc::new(MemoryBank::new(options.min_withdrawal));

    let server = GameServer::new(
        options,
        store,
        Arc::clone(&bank) as Arc<dyn WalletStore>,
        seed_tables(),
    );
    let state = AppState {
        server,
        auth: Arc::new(DevAuth { bank }),
    };

    let addr = std::env::var("TONKRS_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, router(state)).await
}
