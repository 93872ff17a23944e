pub mod binding;
pub mod cache;
pub mod context;
pub mod dialect;
pub mod error;
pub mod extensions;
pub mod gpx_types;
pub mod load;
pub mod options;
pub mod parser;
pub mod registry;
pub mod save;
pub mod summary;
pub mod writer;

use std::io::{Read, Write};
use std::path::Path;

use wasm_bindgen::prelude::*;

pub use crate::context::Gpx;
pub use crate::dialect::GpxVersion;
pub use crate::error::{GpxError, Result};
pub use crate::extensions::{Extensions, GpxExtension, XmlElement};
pub use crate::gpx_types::*;
pub use crate::options::{GpxOptions, LoadOptions, LoadPolicy, SaveOptions};
pub use crate::summary::GpxSummary;

/// Load with the process-wide [`Gpx`] handle.
pub fn load_str(text: &str, policy: LoadPolicy) -> Result<GpxFile> {
    Gpx::global().load_str(text, policy)
}

pub fn load_bytes(bytes: &[u8], policy: LoadPolicy) -> Result<GpxFile> {
    Gpx::global().load_bytes(bytes, policy)
}

pub fn load_reader<R: Read>(source: R, policy: LoadPolicy) -> Result<GpxFile> {
    Gpx::global().load_reader(source, policy)
}

pub fn load_path(path: impl AsRef<Path>, policy: LoadPolicy) -> Result<GpxFile> {
    Gpx::global().load_path(path, policy)
}

/// Save with the process-wide [`Gpx`] handle.
pub fn save_to_writer<W: Write>(file: &GpxFile, sink: W) -> Result<()> {
    Gpx::global().save_to_writer(file, sink)
}

pub fn save_to_vec(file: &GpxFile) -> Result<Vec<u8>> {
    Gpx::global().save_to_vec(file)
}

pub fn save_to_string(file: &GpxFile) -> Result<String> {
    Gpx::global().save_to_string(file)
}

pub fn save_path(file: &GpxFile, path: impl AsRef<Path>) -> Result<()> {
    Gpx::global().save_path(file, path)
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn load_async<R>(source: R, policy: LoadPolicy) -> Result<GpxFile>
where
    R: tokio::io::AsyncRead + Unpin,
{
    Gpx::global().load_async(source, policy).await
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn load_path_async(path: impl AsRef<Path>, policy: LoadPolicy) -> Result<GpxFile> {
    Gpx::global().load_path_async(path, policy).await
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn save_async<W>(file: &GpxFile, sink: W) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    Gpx::global().save_async(file, sink).await
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn save_path_async(file: &GpxFile, path: impl AsRef<Path>) -> Result<()> {
    Gpx::global().save_path_async(file, path).await
}

pub fn register_namespace(prefix: &str, uri: &str) -> Result<()> {
    Gpx::global().register_namespace(prefix, uri)
}

pub fn register_extension_type<T: GpxExtension>() {
    Gpx::global().register_extension_type::<T>()
}

/// Load a GPX 1.0 or 1.1 string and write it back as GPX 1.1.
#[wasm_bindgen(js_name = upgradeGpx)]
pub fn upgrade_gpx(gpx_string: &str, options: JsValue) -> std::result::Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let gpx = Gpx::global();
    let file = gpx.load_str(gpx_string, opts.load.policy)?;
    let mut out = Vec::new();
    gpx.save_with_options(&file, &mut out, &opts.save)?;
    String::from_utf8(out).map_err(|e| JsValue::from(GpxError::from(e)))
}

/// Load a GPX string and describe it, returned as a JS object.
#[wasm_bindgen(js_name = gpxSummary)]
pub fn gpx_summary(gpx_string: &str, options: JsValue) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let file = Gpx::global().load_str(gpx_string, opts.load.policy)?;
    serde_wasm_bindgen::to_value(&GpxSummary::of(&file)).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_options(options: JsValue) -> std::result::Result<GpxOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(GpxOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
