use anyhow::Context;
use crabtether::backend::gphoto2::Gphoto2Backend;
use crabtether::discovery::mdns::MdnsDiscovery;
use crabtether::{CameraSession, DiscoverySource, SettingValue, TetherConfig, EOS_KNOWN_SETTINGS};
use std::collections::BTreeMap;
use std::env;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;

struct Options {
    config: Option<PathBuf>,
    json: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<Options> {
    let mut options = Options {
        config: None,
        json: false,
    };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let path = args.get(i).context("--config needs a path")?;
                options.config = Some(PathBuf::from(path));
            }
            "--json" => options.json = true,
            "--help" | "-h" => {
                println!("Usage: tether-cli [--config <file>] [--json]");
                std::process::exit(0);
            }
            other => anyhow::bail!("Unknown argument: {other}"),
        }
        i += 1;
    }
    Ok(options)
}

fn main() -> anyhow::Result<()> {
    crabtether::init_logging();

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args)?;
    let config = match &options.config {
        Some(path) => TetherConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => TetherConfig::load_or_default(),
    };

    let json = options.json;
    let manager = crabtether::ConnectionManager::new(
        Arc::new(Gphoto2Backend::new()),
        config,
        move |session| demo_session(session, json),
    );

    let mut discovery = MdnsDiscovery::new()?;
    manager.attach(&mut discovery)?;

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let ctrlc_tx = stop_tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(());
    })
    .context("installing Ctrl-C handler")?;
    std::thread::spawn(move || {
        println!("Press enter to exit...\n");
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        let _ = stop_tx.send(());
    });

    let _ = stop_rx.recv();
    discovery.shutdown()?;
    manager.join();
    Ok(())
}

fn demo_session(session: &mut CameraSession<Gphoto2Backend>, json: bool) {
    println!("Connected to {}", session.address());

    let mut settings = match session.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("No settings access: {e}");
            return;
        }
    };

    settings.set("capture", 1i32);

    let listing = settings.enumerate(EOS_KNOWN_SETTINGS.iter().copied());
    if json {
        let present: BTreeMap<_, _> = listing
            .iter()
            .filter_map(|(label, value)| value.as_ref().map(|v| (label, v)))
            .collect();
        match serde_json::to_string_pretty(&present) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Failed to encode settings: {e}"),
        }
    } else {
        for (label, value) in &listing {
            match value {
                Some(value @ SettingValue::ChoiceSingle { .. }) => {
                    println!("{label}: {value} {:?}", value.choices().unwrap_or_default())
                }
                Some(value) => println!("{label}: {value} ({})", value.kind()),
                None => println!("{label}: -"),
            }
        }
    }

    println!("set aperture {}", settings.set("aperture", "8.0"));
    println!("set memory card {}", settings.set("capturetarget", "Memory card"));
    println!("trigger capture {}", settings.set("eosremoterelease", "Immediate"));
    std::thread::sleep(Duration::from_secs(1));
}
