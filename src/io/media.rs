// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Page image loading.
//!
//! This module handles loading rasterised ECG pages (one image file per
//! page), identifying the document by a hash of its bytes, and rendering a
//! page at the scale and rotation the canvas asks for.

use crate::canvas::surface::{PageRenderer, RenderRequest, RenderTarget};
use crate::util::geometry::Size;
use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Hex SHA-256 of the given byte chunks, hashed in order.
pub fn content_hash<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// A multi-page document made of page images.
#[derive(Debug, Clone)]
pub struct Document {
    id: String,
    pages: Vec<Arc<DynamicImage>>,
    image_dpi: f64,
}

impl Document {
    /// Load and decode every page. The document identity covers the bytes of
    /// all pages in order, so reopening the same files finds the same state.
    pub fn open(paths: &[PathBuf], image_dpi: f64) -> Result<Self> {
        let mut bytes = Vec::with_capacity(paths.len());
        for path in paths {
            bytes.push(std::fs::read(path).with_context(|| format!("reading {}", path.display()))?);
        }

        let id = content_hash(bytes.iter().map(Vec::as_slice));
        let mut pages = Vec::with_capacity(bytes.len());
        for (path, data) in paths.iter().zip(&bytes) {
            let image = image::load_from_memory(data)
                .with_context(|| format!("decoding {}", path.display()))?;
            log::info!("Loaded page image: {} ({}x{})", path.display(), image.width(), image.height());
            pages.push(Arc::new(image));
        }

        Ok(Self::from_images(id, pages, image_dpi))
    }

    pub fn from_images(id: String, pages: Vec<Arc<DynamicImage>>, image_dpi: f64) -> Self {
        Self { id, pages, image_dpi }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page by 1-based number.
    pub fn page(&self, number: usize) -> Option<ImagePage> {
        let image = self.pages.get(number.checked_sub(1)?)?;
        Some(ImagePage::new(number, Arc::clone(image), self.image_dpi))
    }
}

/// One page image exposed to the canvas as a [`PageRenderer`].
///
/// Renders are kept until the host collects them with
/// [`ImagePage::take_rendered`] and uploads them as textures.
#[derive(Debug)]
pub struct ImagePage {
    number: usize,
    image: Arc<DynamicImage>,
    image_dpi: f64,
    rotated: Option<(i32, DynamicImage)>,
    rendered: HashMap<RenderTarget, RgbaImage>,
}

impl ImagePage {
    pub fn new(number: usize, image: Arc<DynamicImage>, image_dpi: f64) -> Self {
        Self {
            number,
            image,
            image_dpi,
            rotated: None,
            rendered: HashMap::new(),
        }
    }

    /// Latest render for `target`, if one happened since the last call.
    pub fn take_rendered(&mut self, target: RenderTarget) -> Option<RgbaImage> {
        self.rendered.remove(&target)
    }

    fn rotated_image(&mut self, rotation: i32) -> &DynamicImage {
        let rotation = rotation.rem_euclid(360);
        let cached = matches!(&self.rotated, Some((r, _)) if *r == rotation);
        if !cached {
            let image = match rotation {
                90 => self.image.rotate90(),
                180 => self.image.rotate180(),
                270 => self.image.rotate270(),
                _ => (*self.image).clone(),
            };
            self.rotated = Some((rotation, image));
        }
        match &self.rotated {
            Some((_, image)) => image,
            None => self.image.as_ref(),
        }
    }
}

impl PageRenderer for ImagePage {
    fn page_number(&self) -> usize {
        self.number
    }

    fn viewport(&self, scale: f64, rotation: i32) -> Size {
        let width = self.image.width() as f64 * 72.0 * scale / self.image_dpi;
        let height = self.image.height() as f64 * 72.0 * scale / self.image_dpi;
        match rotation.rem_euclid(360) {
            90 | 270 => Size::new(height, width),
            _ => Size::new(width, height),
        }
    }

    fn render(&mut self, request: &RenderRequest) {
        let scale = request.transform.map_or(1.0, |t| t[0]);
        let width = (request.viewport.width * scale).round().max(1.0) as u32;
        let height = (request.viewport.height * scale).round().max(1.0) as u32;

        let source = self.rotated_image(request.rotation).to_rgba8();
        let pixels = if source.dimensions() == (width, height) {
            source
        } else {
            image::imageops::resize(&source, width, height, FilterType::Triangle)
        };

        log::debug!(
            "Rendered page {} for {:?} at {}x{} (rotation {})",
            self.number,
            request.target,
            width,
            height,
            request.rotation
        );
        self.rendered.insert(request.target, pixels);
    }
}
