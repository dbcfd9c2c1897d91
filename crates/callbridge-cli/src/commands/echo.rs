//! `callbridge unary | server-stream | client-stream | bidi`.
//!
//! Each command runs one echo call to completion, printing responses to
//! stdout as they arrive. A non-OK final status becomes an error.

use anyhow::{Context, Result, bail};
use callbridge_client::Codec;
use callbridge_core::{Metadata, Status};
use callbridge_echo::{EchoClient, EchoCodec, EchoRequest};
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

pub async fn unary(echo: &EchoClient, message: &str, metadata: Option<Metadata>) -> Result<()> {
    let (tx, rx) = oneshot::channel();
    let call = echo.unary_echo(&EchoRequest::new(message), metadata, move |outcome| {
        let _ = tx.send(outcome);
    })?;
    info!(call_id = %call.call().id(), "unary call started");

    let response = rx
        .await
        .context("call ended without reporting")?
        .context("unary call failed")?;
    println!("{}", response.message);
    Ok(())
}

pub async fn server_stream(echo: &EchoClient, message: &str, metadata: Option<Metadata>) -> Result<()> {
    let (data_tx, mut data) = mpsc::unbounded_channel();
    let (status_tx, status) = oneshot::channel();

    let stream = echo.server_streaming_echo(&EchoRequest::new(message), metadata)?;
    let status_tx = std::sync::Mutex::new(Some(status_tx));
    stream
        .on_data(move |response| {
            let _ = data_tx.send(response.message.clone());
        })
        .on_status(move |s| {
            if let Some(tx) = status_tx.lock().expect("status lock").take() {
                let _ = tx.send(s.clone());
            }
        });

    while let Some(line) = data.recv().await {
        println!("{line}");
    }
    check(status.await.context("call ended without a status")?)
}

pub async fn client_stream(echo: &EchoClient, messages: &[String], metadata: Option<Metadata>) -> Result<()> {
    let upload = echo.client_streaming_echo(metadata)?;
    let mut responses = upload.call().responses();

    for message in messages {
        if !upload.write(&EchoRequest::new(message.as_str()))? {
            bail!("request side closed before all messages were written");
        }
    }
    upload.end();

    let codec = EchoCodec::new();
    while let Some(chunk) = responses.next().await {
        match chunk {
            Ok(bytes) => println!("{}", codec.decode(&bytes)?.message),
            Err(err) => return check(Status::from_error(&err, Metadata::new())),
        }
    }
    Ok(())
}

pub async fn bidi(echo: &EchoClient, messages: &[String], metadata: Option<Metadata>) -> Result<()> {
    let chat = echo.bidirectional_streaming_echo(metadata)?;
    let (data_tx, mut data) = mpsc::unbounded_channel();
    let (status_tx, status) = oneshot::channel();
    let status_tx = std::sync::Mutex::new(Some(status_tx));
    chat.on_data(move |response| {
        let _ = data_tx.send(response.message.clone());
    })
    .on_status(move |s| {
        if let Some(tx) = status_tx.lock().expect("status lock").take() {
            let _ = tx.send(s.clone());
        }
    });

    // Wait for each echo before sending the next message.
    for message in messages {
        chat.write(&EchoRequest::new(message.as_str()))?;
        match data.recv().await {
            Some(line) => println!("{line}"),
            None => break,
        }
    }
    chat.end();

    while let Some(line) = data.recv().await {
        println!("{line}");
    }
    check(status.await.context("call ended without a status")?)
}

fn check(status: Status) -> Result<()> {
    if status.is_ok() {
        return Ok(());
    }
    bail!("call failed with status {}: {}", status.code, status.details)
}
