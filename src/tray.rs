use image::{ImageBuffer, Rgba, RgbaImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tray_icon::{
    menu::{Menu, MenuItem, PredefinedMenuItem},
    Icon, TrayIcon, TrayIconBuilder,
};

use crate::error::TrayError;
use crate::state::{RenderChange, TrayState};
use crate::status::IconBucket;

const FALLBACK_SIZE: u32 = 32;
const MIN_ICON_SIZE: u32 = 8;

// Fallback battery geometry, in pixels of a 32x32 canvas.
const BODY_X: (u32, u32) = (3, 26);
const BODY_Y: (u32, u32) = (8, 23);
const TIP_X: (u32, u32) = (27, 29);
const TIP_Y: (u32, u32) = (13, 18);
const INNER_X: (u32, u32) = (6, 23);
const INNER_Y: (u32, u32) = (11, 20);

/// Holds references to menu items that can be updated dynamically.
pub struct MenuItems {
    pub status_item: MenuItem,
    pub exit_item: MenuItem,
}

/// Build the tray menu: a disabled status line and "Exit".
pub fn build_menu(status_text: &str) -> Result<(Menu, MenuItems), TrayError> {
    let menu = Menu::new();

    let status_item = MenuItem::new(status_text, false, None);
    let exit_item = MenuItem::new("Exit", true, None);

    menu.append_items(&[
        &status_item,
        &PredefinedMenuItem::separator(),
        &exit_item,
    ])?;

    Ok((menu, MenuItems { status_item, exit_item }))
}

/// Where an icon in the set came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    File(PathBuf),
    Generated,
}

/// One icon per bucket, loaded once at startup.
pub struct IconSet {
    icons: HashMap<IconBucket, (Icon, IconSource)>,
}

impl IconSet {
    /// Load `<asset_dir>/<bucket>.png` for every bucket. Missing or
    /// undecodable files are replaced by a drawn battery.
    pub fn load(asset_dir: Option<&Path>) -> Result<Self, TrayError> {
        let mut icons = HashMap::new();
        for bucket in IconBucket::ALL {
            let from_file = asset_dir.map(|dir| dir.join(format!("{}.png", bucket.asset_name())));
            let loaded = match from_file {
                Some(path) => match load_png(&path) {
                    Ok(icon) => {
                        debug!(bucket = %bucket, path = %path.display(), "loaded icon");
                        Some((icon, IconSource::File(path)))
                    }
                    Err(e) => {
                        warn!(bucket = %bucket, path = %path.display(), error = %e, "icon unusable, drawing fallback");
                        None
                    }
                },
                None => None,
            };
            let entry = match loaded {
                Some(entry) => entry,
                None => (generate_icon(bucket)?, IconSource::Generated),
            };
            icons.insert(bucket, entry);
        }
        Ok(Self { icons })
    }

    pub fn get(&self, bucket: IconBucket) -> Option<Icon> {
        self.icons.get(&bucket).map(|(icon, _)| icon.clone())
    }

    pub fn source(&self, bucket: IconBucket) -> Option<&IconSource> {
        self.icons.get(&bucket).map(|(_, source)| source)
    }
}

/// Decode a PNG into a tray icon. Images smaller than 8x8 are rejected.
fn load_png(path: &Path) -> Result<Icon, TrayError> {
    let rgba = image::open(path)?.into_rgba8();
    let (w, h) = rgba.dimensions();
    if w < MIN_ICON_SIZE || h < MIN_ICON_SIZE {
        return Err(TrayError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("icon is {w}x{h}, need at least {MIN_ICON_SIZE}x{MIN_ICON_SIZE}"),
        )));
    }
    Ok(Icon::from_rgba(rgba.into_raw(), w, h)?)
}

fn in_range(v: u32, (lo, hi): (u32, u32)) -> bool {
    v >= lo && v <= hi
}

fn fill_color(bucket: IconBucket) -> Rgba<u8> {
    match bucket {
        IconBucket::Low25 => Rgba([0xE0, 0x40, 0x30, 0xFF]),
        IconBucket::Mid50 => Rgba([0xE8, 0xB0, 0x20, 0xFF]),
        _ => Rgba([0x40, 0xC0, 0x50, 0xFF]),
    }
}

/// Draw a 32x32 battery outline filled to the bucket's level. The
/// unavailable bucket gets an empty outline with a dash through it.
pub fn render_fallback(bucket: IconBucket) -> RgbaImage {
    let outline = Rgba([0xC8, 0xC8, 0xC8, 0xFF]);
    let clear = Rgba([0, 0, 0, 0]);
    let inner_width = INNER_X.1 - INNER_X.0 + 1;
    let filled_width = bucket
        .fill_fraction()
        .map(|f| (inner_width as f32 * f).round() as u32)
        .unwrap_or(0);

    ImageBuffer::from_fn(FALLBACK_SIZE, FALLBACK_SIZE, |x, y| {
        let in_body = in_range(x, BODY_X) && in_range(y, BODY_Y);
        let in_tip = in_range(x, TIP_X) && in_range(y, TIP_Y);
        let in_inner = in_range(x, INNER_X) && in_range(y, INNER_Y);
        let in_gap = in_range(x, (BODY_X.0 + 2, BODY_X.1 - 2))
            && in_range(y, (BODY_Y.0 + 2, BODY_Y.1 - 2));

        if in_inner {
            match bucket.fill_fraction() {
                Some(_) if x < INNER_X.0 + filled_width => fill_color(bucket),
                None if in_range(y, (15, 16)) && in_range(x, (10, 19)) => outline,
                _ => clear,
            }
        } else if in_gap {
            clear
        } else if in_body || in_tip {
            outline
        } else {
            clear
        }
    })
}

pub fn generate_icon(bucket: IconBucket) -> Result<Icon, TrayError> {
    let img = render_fallback(bucket);
    let (width, height) = img.dimensions();
    Ok(Icon::from_rgba(img.into_raw(), width, height)?)
}

/// Build the tray icon showing the given icon and tooltip.
pub fn build_tray(menu: Menu, icon: Icon, tooltip: &str) -> Result<TrayIcon, TrayError> {
    let tray = TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_tooltip(tooltip)
        .with_icon(icon)
        .with_menu_on_left_click(true)
        .build()?;
    Ok(tray)
}

/// Push the parts of `state` flagged in `change` to the tray and menu.
pub fn render(tray: &TrayIcon, items: &MenuItems, icons: &IconSet, state: &TrayState, change: RenderChange) {
    if change.icon {
        if let Err(e) = tray.set_icon(icons.get(state.bucket)) {
            warn!(bucket = %state.bucket, error = %e, "failed to set tray icon");
        }
    }
    if change.tooltip {
        if let Err(e) = tray.set_tooltip(Some(&state.tooltip)) {
            warn!(error = %e, "failed to set tooltip");
        }
        items.status_item.set_text(state.status_text());
    }
}
