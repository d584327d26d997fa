use crate::coords::Place;
use crate::display::{DisplayConfig, VerticalAlign, HorizontalAlign};
use crate::format::VideoFormat;

/// Size the picture would take at the configured zoom, ignoring the
/// surface size.
fn default_display_size(source: &VideoFormat, cfg: &DisplayConfig) -> (u64, u64) {
    let (zn, zd) = (cfg.zoom.num.max(1) as u64, cfg.zoom.den.max(1) as u64);
    let (dn, dd) = (cfg.sar.num.max(1) as u64, cfg.sar.den.max(1) as u64);
    let (sn, sd) = (source.sar_num.max(1) as u64, source.sar_den.max(1) as u64);
    let w = source.visible_width as u64;
    let h = source.visible_height as u64;

    if sn >= sd {
        (w * sn * dd * zn / (sd * dn * zd), h * zn / zd)
    } else {
        (w * zn / zd, h * sd * dn * zn / (sn * dd * zd))
    }
}

/// Fits `source` (already oriented) into the display, preserving its aspect
/// ratio, and aligns the result.
pub(crate) fn place_picture(source: &VideoFormat, cfg: &DisplayConfig) -> Place {
    if cfg.width == 0 || cfg.height == 0 || source.visible_width == 0 || source.visible_height == 0
    {
        return Place::default();
    }

    let (display_w, display_h) = if cfg.is_display_filled {
        (cfg.width as u64, cfg.height as u64)
    } else {
        let (w, h) = default_display_size(source, cfg);
        (w.min(cfg.width as u64), h.min(cfg.height as u64))
    };

    // Display aspect of the source, as a fraction width / height.
    let aspect_w = source.visible_width as u64
        * source.sar_num.max(1) as u64
        * cfg.sar.den.max(1) as u64;
    let aspect_h = source.visible_height as u64
        * source.sar_den.max(1) as u64
        * cfg.sar.num.max(1) as u64;

    let scaled_w = display_h * aspect_w / aspect_h;
    let (width, height) = if scaled_w <= display_w {
        (scaled_w, display_h)
    } else {
        (display_w, display_w * aspect_h / aspect_w)
    };
    let (width, height) = (width as i32, height as i32);
    let (surface_w, surface_h) = (cfg.width as i32, cfg.height as i32);

    let x = match cfg.align.horizontal {
        HorizontalAlign::Left => 0,
        HorizontalAlign::Center => (surface_w - width) / 2,
        HorizontalAlign::Right => surface_w - width,
    };
    let y = match cfg.align.vertical {
        VerticalAlign::Top => 0,
        VerticalAlign::Center => (surface_h - height) / 2,
        VerticalAlign::Bottom => surface_h - height,
    };

    Place::new(x, y, width, height)
}
