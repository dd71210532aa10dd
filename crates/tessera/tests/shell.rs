//! Shell operations against generated skin images

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use tessera::{Color, Config, Shell};

fn write_png(dir: &Path, name: &str, w: u32, h: u32, color: [u8; 4]) {
    RgbaImage::from_pixel(w, h, Rgba(color)).save(dir.join(name)).unwrap();
}

fn shell_for(dir: &Path) -> Shell {
    let config = Config {
        resource_path: format!("{}/", dir.display()),
        ..Config::default()
    };
    Shell::new(config).unwrap()
}

#[test]
fn resources_resolve_through_search_path() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "bg.png", 5, 3, [0, 0, 255, 255]);

    let mut shell = shell_for(dir.path());
    let tile = shell.load_image("bg.png").unwrap();
    assert_eq!(shell.tile_min_size(tile), (5, 3));
    assert!(shell.load_image("missing.png").is_none());
}

#[test]
fn vertical_tile_stacks_top_middle_bottom() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "top.png", 4, 2, [255, 0, 0, 255]);
    write_png(dir.path(), "mid.png", 4, 1, [0, 255, 0, 255]);
    write_png(dir.path(), "bottom.png", 4, 3, [0, 0, 255, 255]);

    let mut shell = shell_for(dir.path());
    let tile = shell
        .load_vertical([Some("top.png"), Some("mid.png"), Some("bottom.png")])
        .unwrap();
    assert_eq!(shell.tile_min_size(tile), (4, 5));

    let dst = shell.render_mut().surface_new_rgb(4, 10).unwrap();
    shell.tile_blit(tile, dst, 0, 0, 4, 10);

    let bmp = shell.render_mut().resolve_bitmap(dst).unwrap();
    assert_eq!(bmp.pixel(1, 0), Some(Color::RED));
    assert_eq!(bmp.pixel(1, 4), Some(Color::GREEN));
    assert_eq!(bmp.pixel(1, 9), Some(Color::BLUE));
}

#[test]
fn resize_polling_through_shell() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "art.png", 120, 60, [10, 200, 10, 255]);
    let src = dir.path().join("art.png");
    let dest = dir.path().join("art_small.bmp");
    let (src, dest) = (src.to_str().unwrap(), dest.to_str().unwrap());

    let shell = shell_for(dir.path());
    let deadline = Instant::now() + Duration::from_secs(20);
    let status = loop {
        match shell.submit_resize(src, dest, 30, 30, 1, 3, "BMP") {
            0 if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
            status => break status,
        }
    };

    assert_eq!(status, 1);
    assert_eq!(image::image_dimensions(dest).unwrap(), (30, 30));
    assert_eq!(shell.resize_worker().queue().submitted(), 1);
}

#[cfg(unix)]
#[test]
fn exec_runs_in_background() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("done");

    let shell = shell_for(dir.path());
    shell.exec(format!("touch {}", marker.display()));

    let deadline = Instant::now() + Duration::from_secs(10);
    while !marker.exists() {
        assert!(Instant::now() < deadline, "command did not run");
        thread::sleep(Duration::from_millis(10));
    }
}
