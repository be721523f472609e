//! Print one dashboard frame for a log as plain text.
//!
//! Run: `cargo run --example snapshot -- logs/gpu_20240301_120000.csv`

use gpuwatch_core::{Body, Dashboard, DashboardConfig, FileSource, FrameSpec, Ingestor, loader};

fn main() {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: snapshot <gpu_log.csv>");
        std::process::exit(2);
    };

    let now = chrono::Local::now().naive_local();
    let mut dash = Dashboard::new(DashboardConfig::default(), false, now);
    dash.on_loaded(loader::load(Ingestor::new(FileSource::new(path)), true), now);

    let frame = dash.frame(FrameSpec::default());
    match frame.body {
        Body::Loading => println!("loading"),
        Body::NoData { reason } => {
            println!("no data{}", reason.map(|r| format!(": {r}")).unwrap_or_default());
        }
        Body::Devices(cards) => {
            for card in cards {
                let activity = card.activity.map_or("-", |a| a.label());
                println!("GPU {} [{activity}]", card.device);
                for plot in &card.plots {
                    println!("  {}", plot.metric.label());
                    if let Some(grid) = plot.raster.grid() {
                        for row in grid.rows() {
                            println!("    {row}");
                        }
                    }
                }
            }
        }
    }
    println!("{}", frame.status);
}
