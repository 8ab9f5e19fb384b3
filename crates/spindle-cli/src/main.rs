use std::error::Error;
use std::sync::Arc;

use serde_json::json;
use tracing_subscriber::EnvFilter;

use spindle_core::impls::{JsonMapper, MemoryIndex, MemoryRowSource};
use spindle_core::ports::{Clock, FixedClock};
use spindle_core::{Cell, Clustering, IndexOptions, IndexServiceBuilder, PartitionKey, Row};

const ORDERS: usize = 4;
const ITEMS_PER_ORDER: usize = 5;

fn item(n: usize, written_at: i64) -> Row {
    Row::new(Clustering::new([format!("item-{n}")]))
        .with_cell("sku", Cell::new(json!(format!("sku-{n}")), written_at))
        .with_cell("qty", Cell::new(json!(n), written_at))
}

/// 使い方: `spindle-cli [options.json]`
///
/// インメモリの行ストアとインデックスに対して小さなワークロードを流し、
/// 最後にキューの統計を JSON で出力する。ログは `RUST_LOG` で調整できる。
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) オプション（引数があれば JSON ファイルから）
    let options = match std::env::args().nth(1) {
        Some(path) => IndexOptions::from_path(path)?,
        None => IndexOptions {
            keyspace: "shop".to_string(),
            table: "orders".to_string(),
            index: "orders_idx".to_string(),
            ..IndexOptions::default()
        },
    };

    // (B) サービスを組み立てる
    let index = Arc::new(MemoryIndex::new());
    let source = Arc::new(MemoryRowSource::new());
    let clock = Arc::new(FixedClock::new(1_000));
    let service = Arc::new(
        IndexServiceBuilder::new(options)
            .engine(index.clone())
            .mapper(Arc::new(JsonMapper::new()))
            .row_source(source.clone())
            .clock(clock.clone())
            .build()?,
    );

    // (C) 注文ごとに並行して書き込む（同じ注文の中では順序が保たれる）
    let mut writers = Vec::with_capacity(ORDERS);
    for order in 0..ORDERS {
        let service = Arc::clone(&service);
        let source = Arc::clone(&source);
        let clock = Arc::clone(&clock);
        writers.push(tokio::spawn(async move {
            let key = PartitionKey::new(format!("order-{order}"));
            for n in 0..ITEMS_PER_ORDER {
                let row = item(n, clock.now_in_sec());
                source.write(&key, row.clone());
                service.apply_mutation_now(&key, vec![row], false).await?;
            }
            Ok::<_, spindle_core::IndexError>(())
        }));
    }
    for writer in writers {
        writer.await??;
    }

    // (D) order-0 を丸ごと消して 1 行だけ書き直す
    let reopened = PartitionKey::new("order-0");
    source.delete_partition(&reopened);
    let row = item(99, clock.now_in_sec());
    source.write(&reopened, row.clone());
    service
        .apply_mutation_now(&reopened, vec![row], true)
        .await?;

    // (E) TTL 付きの行は期限が切れると削除として扱われる
    let promo = PartitionKey::new("order-1");
    let expiring = Row::new(Clustering::new(["promo"]))
        .with_cell("code", Cell::with_ttl(json!("WELCOME"), clock.now_in_sec(), 60));
    source.write(&promo, expiring.clone());
    service
        .apply_mutation_now(&promo, vec![expiring.clone()], false)
        .await?;
    clock.advance(120);
    service
        .apply_mutation_now(&promo, vec![expiring], false)
        .await?;

    // (F) commit してから結果を表示
    service.commit().await?;
    tracing::info!(
        documents = index.committed_documents().len(),
        commits = index.commits(),
        "committed"
    );
    println!("{}", serde_json::to_string_pretty(&service.stats())?);

    service.close().await?;
    Ok(())
}
