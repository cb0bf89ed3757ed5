//! Minimal reader for the libGDX-style `.atlas` text format used by Spine exports.

use crate::{Error, TextureRegion};
use std::str::FromStr;

#[derive(Clone, Debug, Default)]
pub struct Atlas {
    pub pages: Vec<AtlasPage>,
    pub regions: Vec<AtlasRegion>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AtlasPage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub pma: bool,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_u: TextureWrap,
    pub wrap_v: TextureWrap,
}

impl AtlasPage {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            width: 0,
            height: 0,
            scale: 1.0,
            pma: false,
            min_filter: TextureFilter::Nearest,
            mag_filter: TextureFilter::Nearest,
            wrap_u: TextureWrap::ClampToEdge,
            wrap_v: TextureWrap::ClampToEdge,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TextureFilter {
    Nearest,
    Linear,
    MipMap,
    MipMapNearestNearest,
    MipMapLinearNearest,
    MipMapNearestLinear,
    MipMapLinearLinear,
}

impl TextureFilter {
    fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "Nearest" => Self::Nearest,
            "Linear" => Self::Linear,
            "MipMap" => Self::MipMap,
            "MipMapNearestNearest" => Self::MipMapNearestNearest,
            "MipMapLinearNearest" => Self::MipMapLinearNearest,
            "MipMapNearestLinear" => Self::MipMapNearestLinear,
            "MipMapLinearLinear" => Self::MipMapLinearLinear,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TextureWrap {
    ClampToEdge,
    Repeat,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AtlasRegion {
    pub name: String,
    pub page: usize,
    pub index: i32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub original_width: u32,
    pub original_height: u32,
    pub degrees: i32,
}

impl AtlasRegion {
    fn new(name: &str, page: usize) -> Self {
        Self {
            name: name.to_string(),
            page,
            index: -1,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            offset_x: 0.0,
            offset_y: 0.0,
            original_width: 0,
            original_height: 0,
            degrees: 0,
        }
    }
}

impl FromStr for Atlas {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Atlas {
    pub fn parse(text: &str) -> Result<Self, Error> {
        let mut atlas = Atlas::default();
        let mut lines = text.lines().map(str::trim_end).peekable();

        loop {
            // Blank lines separate pages.
            while lines.next_if(|l| l.trim().is_empty()).is_some() {}
            let Some(page_name) = lines.next() else {
                break;
            };
            let mut page = AtlasPage::new(page_name.trim());
            while let Some((key, values)) = lines.peek().and_then(|l| entry(l)) {
                lines.next();
                apply_page_field(&mut page, key, &values)?;
            }
            let page_index = atlas.pages.len();
            atlas.pages.push(page);

            while let Some(name) = lines.next_if(|l| !l.trim().is_empty()) {
                let mut region = AtlasRegion::new(name.trim(), page_index);
                while let Some((key, values)) = lines.peek().and_then(|l| entry(l)) {
                    lines.next();
                    apply_region_field(&mut region, key, &values)?;
                }
                if region.original_width == 0 && region.original_height == 0 {
                    region.original_width = region.width;
                    region.original_height = region.height;
                }
                atlas.regions.push(region);
            }
        }

        if atlas.pages.is_empty() {
            return Err(Error::AtlasParse {
                message: "atlas has no pages".to_string(),
            });
        }
        log::debug!(
            "parsed atlas: {} pages, {} regions",
            atlas.pages.len(),
            atlas.regions.len()
        );
        Ok(atlas)
    }

    pub fn find_region(&self, name: &str) -> Option<&AtlasRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Page-normalized texture coordinates for a named region.
    pub fn texture_region(&self, name: &str) -> Option<TextureRegion> {
        let region = self.find_region(name)?;
        let page = self.pages.get(region.page)?;
        let pw = page.width.max(1) as f32;
        let ph = page.height.max(1) as f32;
        let (x, y) = (region.x as f32, region.y as f32);
        let (w, h) = (region.width as f32, region.height as f32);
        let (u2, v2) = if region.degrees == 90 {
            ((x + h) / pw, (y + w) / ph)
        } else {
            ((x + w) / pw, (y + h) / ph)
        };
        Some(TextureRegion {
            page: region.page,
            page_width: page.width as f32,
            page_height: page.height as f32,
            u: x / pw,
            v: y / ph,
            u2,
            v2,
            degrees: region.degrees,
            offset_x: region.offset_x,
            offset_y: region.offset_y,
            width: w,
            height: h,
            original_width: region.original_width as f32,
            original_height: region.original_height as f32,
        })
    }
}

/// Splits `key: a, b, c` into the key and its comma-separated values.
fn entry(line: &str) -> Option<(&str, Vec<&str>)> {
    let (key, rest) = line.split_once(':')?;
    Some((key.trim(), rest.split(',').map(str::trim).collect()))
}

fn numbers<T: FromStr, const N: usize>(key: &str, values: &[&str]) -> Result<[T; N], Error> {
    let invalid = || Error::AtlasParse {
        message: format!("invalid '{key}' value: {}", values.join(",")),
    };
    if values.len() < N {
        return Err(invalid());
    }
    let mut out = Vec::with_capacity(N);
    for v in &values[..N] {
        out.push(v.parse::<T>().map_err(|_| invalid())?);
    }
    out.try_into().map_err(|_| invalid())
}

fn apply_page_field(page: &mut AtlasPage, key: &str, values: &[&str]) -> Result<(), Error> {
    match key {
        "size" => [page.width, page.height] = numbers(key, values)?,
        "scale" => [page.scale] = numbers(key, values)?,
        "pma" => page.pma = values.first() == Some(&"true"),
        "filter" => {
            let min = values.first().and_then(|v| TextureFilter::parse(v));
            let mag = values.get(1).and_then(|v| TextureFilter::parse(v)).or(min);
            match (min, mag) {
                (Some(min), Some(mag)) => {
                    page.min_filter = min;
                    page.mag_filter = mag;
                }
                _ => log::warn!("ignoring unknown atlas filter: {}", values.join(",")),
            }
        }
        "repeat" => {
            let value = values.first().copied().unwrap_or("none");
            page.wrap_u = if value.contains('x') {
                TextureWrap::Repeat
            } else {
                TextureWrap::ClampToEdge
            };
            page.wrap_v = if value.contains('y') {
                TextureWrap::Repeat
            } else {
                TextureWrap::ClampToEdge
            };
        }
        _ => {}
    }
    Ok(())
}

fn apply_region_field(region: &mut AtlasRegion, key: &str, values: &[&str]) -> Result<(), Error> {
    match key {
        "xy" => [region.x, region.y] = numbers(key, values)?,
        "size" => [region.width, region.height] = numbers(key, values)?,
        "bounds" => [region.x, region.y, region.width, region.height] = numbers(key, values)?,
        "offset" => [region.offset_x, region.offset_y] = numbers(key, values)?,
        "orig" => [region.original_width, region.original_height] = numbers(key, values)?,
        "offsets" => {
            [region.offset_x, region.offset_y] = numbers(key, values)?;
            [region.original_width, region.original_height] = numbers(key, &values[2..])?;
        }
        "rotate" => {
            region.degrees = match values.first().copied() {
                Some("true") => 90,
                Some("false") | None => 0,
                Some(v) => v.parse().map_err(|_| Error::AtlasParse {
                    message: format!("invalid 'rotate' value: {v}"),
                })?,
            }
        }
        "index" => [region.index] = numbers(key, values)?,
        _ => {}
    }
    Ok(())
}
