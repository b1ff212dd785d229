// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `stepdriver` binary: runs `.feature` files and reports to the console.

use std::{fs, io, path::Path, process::ExitCode};

use anyhow::Context as _;
use stepdriver::{
    cli::{self, Parser as _},
    parser,
    plugin::script::{Directory, Store as _},
    result::Status,
    writer::{self, Ext as _, Writer as _},
    Session,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let opts = cli::Opts::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if let Some(dir) = &opts.scripts {
        list_scripts(dir)?;
    }

    let mut paths = Vec::new();
    for input in &opts.inputs {
        let found = parser::feature_files(input)
            .with_context(|| format!("Failed to look for features in {}", input.display()))?;
        paths.extend(found);
    }
    if paths.is_empty() {
        anyhow::bail!("No .feature files found");
    }

    let json = opts
        .json
        .as_ref()
        .map(|p| {
            fs::File::create(p)
                .map(writer::Json::new)
                .with_context(|| format!("Failed to create {}", p.display()))
        })
        .transpose()?;
    let mut out = writer::Console::stdout(opts.color).tee(json);

    let mut session = Session::new();
    session
        .load_defaults(opts.browser.config())
        .await
        .context("Failed to load plugins")?;
    let mut events = session.subscribe();

    let cancel = session.cancel_handle();
    _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling");
            cancel.cancel();
        }
    });

    let filter = opts.filter();
    let run = async move {
        let mut failed = false;
        for path in &paths {
            let ok = session
                .execute_path(path, &filter)
                .await
                .is_some_and(|res| res.status != Status::Failed);
            failed |= !ok;
        }
        if let Err(e) = session.destroy().await {
            tracing::warn!("failed to unload plugins: {e}");
        }
        failed
    };
    let report = async {
        while let Some(ev) = events.recv().await {
            out.handle_event(&ev).await?;
        }
        out.finish().await
    };

    let (failed, written) = tokio::join!(run, report);
    written.context("Failed to write output")?;

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// Prints the user scripts found in the given `dir`.
fn list_scripts(dir: &Path) -> anyhow::Result<()> {
    let store = Directory {
        path: dir.to_owned(),
        extension: None,
    };
    let scripts = store
        .scripts()
        .with_context(|| format!("Failed to read scripts from {}", dir.display()))?;
    eprintln!(
        "{} script(s) found in {}, not executed as no script engine is bundled:",
        scripts.len(),
        dir.display(),
    );
    for s in scripts {
        eprintln!("  - {}", s.name);
    }
    Ok(())
}
