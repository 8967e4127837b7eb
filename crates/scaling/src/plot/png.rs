use resvg::{tiny_skia, usvg};

use super::PlotError;

/// Rasterization options with the system fonts loaded.
///
/// Without any usable font, text elements are dropped and shapes still render.
pub fn system_font_options() -> usvg::Options<'static> {
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    tracing::debug!(faces = opt.fontdb.len(), "Loaded system fonts for plotting");
    opt
}

/// Convert an SVG document to PNG bytes, scaling its pixel size by `scale`.
pub fn svg_to_png(svg: &str, opt: &usvg::Options, scale: f32) -> Result<Vec<u8>, PlotError> {
    let tree = usvg::Tree::from_str(svg, opt).map_err(|e| PlotError::Svg(e.to_string()))?;

    let size = tree.size();
    let w = (size.width() * scale).ceil() as u32;
    let h = (size.height() * scale).ceil() as u32;

    let mut pixmap = tiny_skia::Pixmap::new(w, h)
        .ok_or_else(|| PlotError::Raster(format!("cannot allocate a {w}x{h} pixmap")))?;
    pixmap.fill(tiny_skia::Color::WHITE);

    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    pixmap
        .encode_png()
        .map_err(|e| PlotError::Raster(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn rasterizes_simple_svg() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20" viewBox="0 0 40 20"><rect x="5" y="5" width="10" height="10" fill="black"/></svg>"#;
        let png = svg_to_png(svg, &usvg::Options::default(), 2.0).unwrap();
        assert_eq!(&png[..8], &PNG_MAGIC);
    }

    #[test]
    fn invalid_svg_is_an_error() {
        let err = svg_to_png("<not-svg", &usvg::Options::default(), 1.0).unwrap_err();
        assert!(matches!(err, PlotError::Svg(_)));
    }
}
