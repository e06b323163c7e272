//! In-memory glTF fixtures for the integration tests.

#![allow(dead_code)]

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use url::Url;

const FLOAT: u32 = 5126;
const UNSIGNED_BYTE: u32 = 5121;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;

/// Packs accessor data into one binary buffer, 4-byte aligned per view.
#[derive(Default)]
pub struct BufferBuilder {
    buffer: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl BufferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_view(&mut self, bytes: &[u8]) -> usize {
        while self.buffer.len() % 4 != 0 {
            self.buffer.push(0);
        }
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
        }));
        self.views.len() - 1
    }

    fn push_accessor(&mut self, view: usize, component_type: u32, element_type: &str, count: usize) -> usize {
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": component_type,
            "type": element_type,
            "count": count,
        }));
        self.accessors.len() - 1
    }

    pub fn vec3(&mut self, values: &[[f32; 3]]) -> usize {
        let bytes: Vec<u8> = values.iter().flatten().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.push_view(&bytes);
        self.push_accessor(view, FLOAT, "VEC3", values.len())
    }

    pub fn vec2(&mut self, values: &[[f32; 2]]) -> usize {
        let bytes: Vec<u8> = values.iter().flatten().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.push_view(&bytes);
        self.push_accessor(view, FLOAT, "VEC2", values.len())
    }

    pub fn vec4(&mut self, values: &[[f32; 4]]) -> usize {
        let bytes: Vec<u8> = values.iter().flatten().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.push_view(&bytes);
        self.push_accessor(view, FLOAT, "VEC4", values.len())
    }

    pub fn joints(&mut self, values: &[[u8; 4]]) -> usize {
        let bytes: Vec<u8> = values.iter().flatten().copied().collect();
        let view = self.push_view(&bytes);
        self.push_accessor(view, UNSIGNED_BYTE, "VEC4", values.len())
    }

    pub fn mat4(&mut self, values: &[[f32; 16]]) -> usize {
        let bytes: Vec<u8> = values.iter().flatten().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.push_view(&bytes);
        self.push_accessor(view, FLOAT, "MAT4", values.len())
    }

    pub fn indices_u16(&mut self, values: &[u16]) -> usize {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.push_view(&bytes);
        self.push_accessor(view, UNSIGNED_SHORT, "SCALAR", values.len())
    }

    pub fn indices_u32(&mut self, values: &[u32]) -> usize {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.push_view(&bytes);
        self.push_accessor(view, UNSIGNED_INT, "SCALAR", values.len())
    }

    /// Overrides the declared element count of an accessor.
    pub fn set_count(&mut self, accessor: usize, count: u64) {
        self.accessors[accessor]["count"] = json!(count);
    }

    fn attach(&self, document: &mut Value, buffer: Value) {
        document["asset"] = json!({ "version": "2.0", "generator": "fixture" });
        document["buffers"] = json!([buffer]);
        document["bufferViews"] = Value::Array(self.views.clone());
        document["accessors"] = Value::Array(self.accessors.clone());
    }

    /// `.gltf` JSON with the buffer embedded as a base64 data URI.
    pub fn into_gltf(self, mut document: Value) -> Vec<u8> {
        let uri = format!("data:application/octet-stream;base64,{}", STANDARD.encode(&self.buffer));
        self.attach(&mut document, json!({ "byteLength": self.buffer.len(), "uri": uri }));
        serde_json::to_vec(&document).expect("serialize fixture")
    }

    /// `.gltf` JSON pointing at an external buffer by relative URI.
    /// Returns the document and the buffer bytes it expects.
    pub fn into_gltf_external(self, mut document: Value, uri: &str) -> (Vec<u8>, Vec<u8>) {
        self.attach(&mut document, json!({ "byteLength": self.buffer.len(), "uri": uri }));
        let json = serde_json::to_vec(&document).expect("serialize fixture");
        (json, self.buffer)
    }

    /// Binary GLB container with the buffer in the BIN chunk.
    pub fn into_glb(mut self, mut document: Value) -> Vec<u8> {
        while self.buffer.len() % 4 != 0 {
            self.buffer.push(0);
        }
        self.attach(&mut document, json!({ "byteLength": self.buffer.len() }));
        let mut json = serde_json::to_vec(&document).expect("serialize fixture");
        while json.len() % 4 != 0 {
            json.push(b' ');
        }

        let total = 12 + 8 + json.len() + 8 + self.buffer.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(self.buffer.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&self.buffer);
        glb
    }
}

pub fn base_url() -> Url {
    Url::parse("file:///models/avatar.gltf").expect("fixture url")
}

pub fn offline(url: &Url) -> anyhow::Result<Vec<u8>> {
    anyhow::bail!("no network in tests: {url}")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

/// One node, one mesh, one triangle with normals.
pub fn single_triangle(builder: &mut BufferBuilder) -> Value {
    let positions = builder.vec3(&TRIANGLE);
    let normals = builder.vec3(&[[0.0, 0.0, 1.0]; 3]);
    let indices = builder.indices_u16(&[0, 1, 2]);
    json!({
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "Body", "mesh": 0 }],
        "meshes": [{
            "name": "Triangle",
            "primitives": [{
                "attributes": { "POSITION": positions, "NORMAL": normals },
                "indices": indices,
            }],
        }],
    })
}
