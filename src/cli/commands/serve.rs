//! arec serve - Serve the HTTP API

use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::app::AppContext;
use crate::error::Result;
use crate::server::Server;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (defaults to server.bind)
    #[arg(long, short)]
    pub bind: Option<String>,
}

pub fn run(ctx: &AppContext, args: &ServeArgs) -> Result<()> {
    let bind = args.bind.as_deref().unwrap_or(&ctx.config.server.bind);
    let recommender = Arc::new(ctx.load_recommender()?);
    let server = Server::bind(bind, recommender)?
        .with_io_timeout(Duration::from_secs(ctx.config.server.io_timeout_secs));

    if !ctx.robot_mode {
        eprintln!("Listening on http://{}", server.local_addr()?);
    }
    server.serve()
}
