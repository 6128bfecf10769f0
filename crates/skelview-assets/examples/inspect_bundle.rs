//! Load a skeleton bundle from disk and report what resolved.
//!
//! ```text
//! cargo run --example inspect_bundle -- hero.skel hero.atlas [page images...]
//! ```
//!
//! Prints the export version, the runtime line it needs, every atlas page
//! with its texture size, and any load errors.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use skelview_assets::prelude::*;
use skelview_assets::{HeadlessTextures, RuntimeLine};

fn main() -> ExitCode {
    skelview_core::logging::init();
    skelview_core::profiling::init_profiling();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    let bundle = match SkeletonBundle::from_paths(&paths) {
        Ok(bundle) => bundle,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    println!("skeleton: {} ({:?})", bundle.skeleton_name, bundle.format);
    match &bundle.version {
        Some(version) => println!("version:  {}", version),
        None => println!("version:  unknown"),
    }
    match bundle.runtime() {
        RuntimeLine::Spine38 => println!("runtime:  3.8"),
        RuntimeLine::Spine41 => println!("runtime:  4.1"),
        RuntimeLine::Unsupported => println!("runtime:  unsupported"),
    }

    let textures = std::sync::Arc::new(HeadlessTextures::new());
    let cache = AssetCache::with_textures(bundle.resolver(), textures.clone());
    let (_, atlas) = bundle.load_into(&cache);

    let deadline = Instant::now() + Duration::from_secs(30);
    while !cache.is_loading_complete() {
        if Instant::now() >= deadline {
            eprintln!("timed out with {} loads outstanding", cache.outstanding());
            return ExitCode::FAILURE;
        }
        cache.update();
        for event in cache.drain_events() {
            tracing::debug!("{:?}", event);
        }
        skelview_core::profiling::new_frame();
        std::thread::sleep(Duration::from_millis(1));
    }

    if let Ok(atlas) = cache.require_atlas(atlas.as_str()) {
        println!("atlas:    {} pages", atlas.len());
        for page in atlas.pages() {
            println!(
                "  {:<24} {}x{}",
                page.name, page.texture.width, page.texture.height
            );
        }
    }

    let errors = cache.errors();
    for (locator, err) in &errors {
        eprintln!("error: {}: {}", locator, err);
    }

    tracing::debug!(
        "{} loads completed, {} textures live",
        cache.completed(),
        textures.live_count()
    );

    if errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
