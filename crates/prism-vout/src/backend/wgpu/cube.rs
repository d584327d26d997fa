//! `.cube` 3D lookup table parser.

use anyhow::{Context, Result, bail, ensure};

/// Largest accepted `LUT_3D_SIZE`.
const MAX_SIZE: u32 = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct CubeLut {
    pub title: Option<String>,
    /// Entries per axis.
    pub size: u32,
    pub domain_min: [f32; 3],
    pub domain_max: [f32; 3],
    /// `size³` entries, red varying fastest, then green, then blue.
    pub entries: Vec<[f32; 3]>,
}

impl CubeLut {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data).context("lookup table is not UTF-8 text")?;

        let mut title = None;
        let mut size = None;
        let mut domain_min = [0.0; 3];
        let mut domain_max = [1.0; 3];
        let mut entries = Vec::new();

        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut words = line.split_whitespace();
            let Some(key) = words.next() else { continue };
            let lineno = n + 1;

            match key {
                "TITLE" => {
                    title = Some(line["TITLE".len()..].trim().trim_matches('"').to_owned());
                }
                "LUT_3D_SIZE" => {
                    let n: u32 = words
                        .next()
                        .context("missing LUT_3D_SIZE value")?
                        .parse()
                        .with_context(|| format!("line {lineno}: invalid LUT_3D_SIZE"))?;
                    ensure!(
                        (2..=MAX_SIZE).contains(&n),
                        "line {lineno}: LUT_3D_SIZE {n} out of range"
                    );
                    size = Some(n);
                    entries.reserve((n * n * n) as usize);
                }
                "LUT_1D_SIZE" => bail!("line {lineno}: 1D lookup tables are not supported"),
                "DOMAIN_MIN" => domain_min = triple(words, lineno)?,
                "DOMAIN_MAX" => domain_max = triple(words, lineno)?,
                _ if key.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') => {
                    ensure!(size.is_some(), "line {lineno}: data before LUT_3D_SIZE");
                    entries.push(triple(line.split_whitespace(), lineno)?);
                }
                _ => log::debug!("line {lineno}: ignoring cube keyword {key}"),
            }
        }

        let size = size.context("missing LUT_3D_SIZE")?;
        let expected = (size * size * size) as usize;
        ensure!(
            entries.len() == expected,
            "expected {expected} entries, found {}",
            entries.len()
        );
        for axis in 0..3 {
            ensure!(
                domain_max[axis] > domain_min[axis],
                "empty domain on axis {axis}"
            );
        }

        Ok(Self {
            title,
            size,
            domain_min,
            domain_max,
            entries,
        })
    }

    /// Entries quantized to RGBA8 for texture upload.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        self.entries
            .iter()
            .flat_map(|[r, g, b]| [q(*r), q(*g), q(*b), 255])
            .collect()
    }

    /// Scale and offset mapping an input color onto texel centers.
    pub fn coord_transform(&self) -> ([f32; 3], [f32; 3]) {
        let n = self.size as f32;
        let mut scale = [0.0; 3];
        let mut offset = [0.0; 3];
        for i in 0..3 {
            scale[i] = (n - 1.0) / n / (self.domain_max[i] - self.domain_min[i]);
            offset[i] = 0.5 / n - self.domain_min[i] * scale[i];
        }
        (scale, offset)
    }
}

fn triple<'a>(mut words: impl Iterator<Item = &'a str>, lineno: usize) -> Result<[f32; 3]> {
    let mut out = [0.0; 3];
    for v in &mut out {
        *v = words
            .next()
            .with_context(|| format!("line {lineno}: expected three values"))?
            .parse()
            .with_context(|| format!("line {lineno}: invalid number"))?;
    }
    ensure!(words.next().is_none(), "line {lineno}: trailing values");
    Ok(out)
}
