//! Bitmap font resources
//!
//! A font description lists atlas pages, glyph metrics and kerning pairs.
//! Each page is requested as a texture resource and held by the font.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use void_resource::{
    AssetRequest, Name, RequestInfo, Resource, ResourceError, ResourceHandler, ResourceKind, ResourceResult,
    ResourceSystem,
};

use crate::common::load_config;

/// Atlas page as written in font files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    pub id: u32,
    pub file: String,
}

/// Placement of one glyph in the atlas
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub codepoint: u32,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub x_offset: i16,
    #[serde(default)]
    pub y_offset: i16,
    pub x_advance: i16,
    #[serde(default)]
    pub page: u32,
}

/// Advance adjustment between two glyphs
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Kerning {
    pub first: u32,
    pub second: u32,
    pub amount: i16,
}

/// Font description as written in font files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FontConfig {
    pub face: String,
    pub size: u32,
    pub line_height: u32,
    pub baseline: u32,
    pub atlas_size: [u32; 2],
    #[serde(default)]
    pub package: String,
    pub pages: Vec<PageConfig>,
    pub glyphs: Vec<Glyph>,
    #[serde(default)]
    pub kernings: Vec<Kerning>,
}

/// Payload of a bitmap font resource
#[derive(Clone, Debug, PartialEq)]
pub struct BitmapFont {
    pub face: String,
    pub size: u32,
    pub line_height: u32,
    pub baseline: u32,
    pub atlas_size: [u32; 2],
    /// Texture resource for each page, in page id order
    pub pages: Vec<Name>,
    pub glyphs: Vec<Glyph>,
    kerning: HashMap<(u32, u32), i16>,
}

impl BitmapFont {
    /// Glyph for a character
    pub fn glyph(&self, ch: char) -> Option<&Glyph> {
        let codepoint = ch as u32;
        self.glyphs.iter().find(|g| g.codepoint == codepoint)
    }

    /// Kerning between two characters, zero when none is defined
    pub fn kerning(&self, first: char, second: char) -> i16 {
        self.kerning
            .get(&(first as u32, second as u32))
            .copied()
            .unwrap_or(0)
    }

    /// Horizontal extent of a single line of text
    pub fn measure(&self, text: &str) -> i32 {
        let mut width = 0i32;
        let mut previous = None;
        for ch in text.chars() {
            if let Some(prev) = previous {
                width += self.kerning(prev, ch) as i32;
            }
            if let Some(glyph) = self.glyph(ch) {
                width += glyph.x_advance as i32;
            }
            previous = Some(ch);
        }
        width
    }
}

fn validate(name: &Name, config: &FontConfig) -> ResourceResult<()> {
    if config.pages.is_empty() {
        return Err(ResourceError::invalid_config(name, "font has no pages"));
    }
    for (i, page) in config.pages.iter().enumerate() {
        if page.id as usize != i {
            return Err(ResourceError::invalid_config(
                name,
                format!("page ids must be 0..{}, found {} at {}", config.pages.len(), page.id, i),
            ));
        }
    }
    if let Some(glyph) = config.glyphs.iter().find(|g| g.page as usize >= config.pages.len()) {
        return Err(ResourceError::invalid_config(
            name,
            format!("glyph {} refers to missing page {}", glyph.codepoint, glyph.page),
        ));
    }
    Ok(())
}

fn build_font(
    system: &mut ResourceSystem,
    resource: &mut Resource,
    config: FontConfig,
    synchronous: bool,
) -> ResourceResult<()> {
    let name = resource.name().clone();
    validate(&name, &config)?;

    let mut pages: Vec<Name> = Vec::with_capacity(config.pages.len());
    for page in &config.pages {
        let mut info = RequestInfo::new(ResourceKind::Texture)
            .with_asset(AssetRequest::image(&page.file, config.package.as_str()));
        if synchronous {
            info = info.synchronous();
        }
        if let Err(e) = system.request(&page.file, info) {
            log::error!("Font {}: page {} failed: {}", name, page.file, e);
            for requested in &pages {
                system.release(requested);
            }
            return Err(e);
        }
        pages.push(Name::new(&page.file));
    }

    let kerning = config
        .kernings
        .iter()
        .map(|k| ((k.first, k.second), k.amount))
        .collect();
    resource.set_payload(BitmapFont {
        face: config.face,
        size: config.size,
        line_height: config.line_height,
        baseline: config.baseline,
        atlas_size: config.atlas_size,
        pages,
        glyphs: config.glyphs,
        kerning,
    });
    resource.mark_loaded();
    Ok(())
}

/// Builds bitmap fonts from JSON descriptions
#[derive(Default)]
pub struct BitmapFontHandler;

impl BitmapFontHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceHandler for BitmapFontHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BitmapFont
    }

    fn request(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        info: RequestInfo,
    ) -> ResourceResult<()> {
        let source = info.expect_config(resource.name())?;
        let synchronous = info.synchronous;
        load_config(system, resource, source, synchronous, move |system, resource, config| {
            build_font(system, resource, config, synchronous)
        })
    }

    fn release(&mut self, system: &mut ResourceSystem, resource: &mut Resource) {
        if let Some(font) = resource.take_payload::<BitmapFont>() {
            for page in &font.pages {
                system.release(page);
            }
        }
    }
}
