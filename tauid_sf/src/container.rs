//! Files holding named histograms, functions and formulas.

use super::error::{Error, Result};
use super::formula::Formula2D;
use super::function::ParametricFunction;
use super::histogram::Histogram;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

const LZ4_MAGIC: u32 = 0x18_4D_22_04;
const FILE_HEADER: &[u8; 16] = b"TAUSFCON\x01\0\0\0\0\0\0\0";

/// An object stored in a [`Container`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Object {
    /// A histogram.
    Histogram(Histogram),
    /// A function of the kinematic variable.
    Function(ParametricFunction),
    /// A formula of the kinematic variable and the score.
    Formula(Formula2D),
}

impl Object {
    /// Returns the name of this object's type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Histogram(_) => "histogram",
            Self::Function(_) => "function",
            Self::Formula(_) => "formula",
        }
    }
}

/// An [`Object`] together with its name.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct NamedObject {
    /// Name of the object.
    pub name: String,
    /// The object.
    pub object: Object,
}

/// The on-disk format of a container, chosen by the file name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    /// Human-readable YAML, for files ending in `.yaml` or `.yml`.
    Yaml,
    /// Binary encoding.
    Binary,
    /// LZ4-compressed binary encoding, for files ending in `.lz4`.
    Lz4,
}

impl Format {
    /// Determines the format of the file at `path`.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            Some("lz4") => Self::Lz4,
            _ => Self::Binary,
        }
    }
}

/// An ordered collection of uniquely named objects.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Container {
    objects: Vec<NamedObject>,
}

impl Container {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `object` under `name`. An object with the same name is replaced in place.
    pub fn push(&mut self, name: &str, object: Object) {
        if let Some(named) = self.objects.iter_mut().find(|named| named.name == name) {
            named.object = object;
        } else {
            self.objects.push(NamedObject {
                name: name.to_owned(),
                object,
            });
        }
    }

    /// Returns the object named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Object> {
        self.objects
            .iter()
            .find(|named| named.name == name)
            .map(|named| &named.object)
    }

    /// Iterates over all objects in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &NamedObject> {
        self.objects.iter()
    }

    /// Returns the number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if there are no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Reads a container in the binary format from `reader`, which may be LZ4-compressed. Reading
    /// is buffered.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or if `reader` does not contain a container of a
    /// supported version.
    pub fn read_binary(reader: impl Read) -> Result<Self> {
        let mut reader = BufReader::new(reader);
        let buffer = reader.fill_buf()?;

        let compressed = buffer
            .get(0..4)
            .and_then(|magic| magic.try_into().ok())
            .is_some_and(|magic| u32::from_le_bytes(magic) == LZ4_MAGIC);

        if compressed {
            Self::read_uncompressed(BufReader::new(FrameDecoder::new(reader)))
        } else {
            Self::read_uncompressed(reader)
        }
    }

    fn read_uncompressed(mut reader: impl Read) -> Result<Self> {
        let mut header = [0; 16];
        reader
            .read_exact(&mut header)
            .map_err(|err| Error::General(format!("not a container file: {err}")))?;

        if &header[0..8] != b"TAUSFCON" {
            return Err(Error::General("not a container file".to_owned()));
        }

        let mut version = [0; 8];
        version.copy_from_slice(&header[8..16]);

        match u64::from_le_bytes(version) {
            1 => bincode::deserialize_from(reader).map_err(|err| Error::Other(err.into())),
            version => Err(Error::General(format!(
                "file version {version} is not supported"
            ))),
        }
    }

    /// Serializes `self` into `writer` in the binary format. Writing is buffered.
    ///
    /// # Errors
    ///
    /// If writing fails an error is returned.
    pub fn write_binary(&self, writer: impl Write) -> Result<()> {
        let mut writer = BufWriter::new(writer);

        writer.write_all(FILE_HEADER)?;
        bincode::serialize_into(&mut writer, self).map_err(|err| Error::Other(err.into()))?;
        writer.flush()?;

        Ok(())
    }

    /// Serializes `self` into `writer`, using LZ4 compression.
    ///
    /// # Errors
    ///
    /// If writing or compression fails an error is returned.
    pub fn write_lz4(&self, writer: impl Write) -> Result<()> {
        let mut encoder = FrameEncoder::new(writer);
        self.write_binary(&mut encoder)?;
        encoder
            .try_finish()
            .map_err(|err| Error::Other(err.into()))?;

        Ok(())
    }

    /// Reads a container in the YAML format from `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if `reader` does not contain a valid container.
    pub fn read_yaml(reader: impl Read) -> Result<Self> {
        serde_yaml::from_reader(reader).map_err(|err| Error::Other(err.into()))
    }

    /// Serializes `self` into `writer` in the YAML format.
    ///
    /// # Errors
    ///
    /// If writing fails an error is returned.
    pub fn write_yaml(&self, writer: impl Write) -> Result<()> {
        let mut writer = BufWriter::new(writer);
        serde_yaml::to_writer(&mut writer, self).map_err(|err| Error::Other(err.into()))?;
        writer.flush()?;

        Ok(())
    }

    /// Reads the container file at `path`, in the format given by [`Format::from_path`]; binary
    /// files are recognized as LZ4-compressed regardless of their name.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can not be opened or read.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)?;

        let container = match Format::from_path(path) {
            Format::Yaml => Self::read_yaml(BufReader::new(file)),
            Format::Binary | Format::Lz4 => Self::read_binary(file),
        }?;

        debug!("read {} objects from {}", container.len(), path.display());

        Ok(container)
    }

    /// Writes `self` to the file at `path` in the format given by [`Format::from_path`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file can not be created or written.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;

        match Format::from_path(path) {
            Format::Yaml => self.write_yaml(file)?,
            Format::Binary => self.write_binary(file)?,
            Format::Lz4 => self.write_lz4(file)?,
        }

        debug!("wrote {} objects to {}", self.len(), path.display());

        Ok(())
    }
}

impl FromIterator<(String, Object)> for Container {
    fn from_iter<T: IntoIterator<Item = (String, Object)>>(iter: T) -> Self {
        let mut container = Self::new();

        for (name, object) in iter {
            container.push(&name, object);
        }

        container
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bin::BinLimits;

    fn container() -> Container {
        let histogram = Histogram::new(
            BinLimits::new(vec![20.0, 25.0, 1000.0]).unwrap(),
            vec![0.95, f64::NAN],
            vec![0.05, f64::INFINITY],
        )
        .unwrap();

        [
            ("Tight".to_owned(), Object::Histogram(histogram.clone())),
            (
                "Loose_cent".to_owned(),
                Object::Function(ParametricFunction::new("(x>20)*0.9", 0.0, 500.0).unwrap()),
            ),
            (
                "sf".to_owned(),
                Object::Formula(Formula2D::new("sf", "((x>20.0)*((0.9*(y>0.5))))".to_owned())),
            ),
            ("Loose".to_owned(), Object::Histogram(histogram)),
        ]
        .into_iter()
        .collect()
    }

    fn assert_same(lhs: &Container, rhs: &Container) {
        assert_eq!(
            lhs.iter().map(|named| &named.name).collect::<Vec<_>>(),
            rhs.iter().map(|named| &named.name).collect::<Vec<_>>()
        );

        for (lhs, rhs) in lhs.iter().zip(rhs.iter()) {
            match (&lhs.object, &rhs.object) {
                (Object::Histogram(lhs), Object::Histogram(rhs)) => {
                    assert_eq!(lhs.limits(), rhs.limits());
                    assert_eq!(lhs.contents()[0], rhs.contents()[0]);
                    assert!(rhs.contents()[1].is_nan());
                    assert_eq!(lhs.errors(), rhs.errors());
                }
                (lhs, rhs) => assert_eq!(lhs, rhs),
            }
        }
    }

    #[test]
    fn push_replaces() {
        let mut container = container();
        container.push(
            "sf",
            Object::Function(ParametricFunction::new("x", 0.0, 1.0).unwrap()),
        );

        assert_eq!(container.len(), 4);
        assert_eq!(container.get("sf").unwrap().type_name(), "function");
        assert_eq!(container.iter().nth(2).unwrap().name, "sf");
        assert!(container.get("Medium").is_none());
    }

    #[test]
    fn binary_round_trip() {
        let container = container();
        let mut buffer = Vec::new();
        container.write_binary(&mut buffer).unwrap();

        assert_eq!(&buffer[0..16], FILE_HEADER);
        assert_same(&container, &Container::read_binary(buffer.as_slice()).unwrap());

        let mut compressed = Vec::new();
        container.write_lz4(&mut compressed).unwrap();

        assert_eq!(u32::from_le_bytes(compressed[0..4].try_into().unwrap()), LZ4_MAGIC);
        assert_same(
            &container,
            &Container::read_binary(compressed.as_slice()).unwrap(),
        );
    }

    #[test]
    fn yaml_round_trip() {
        let container = container();
        let mut buffer = Vec::new();
        container.write_yaml(&mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("!Histogram"));
        assert!(text.contains("!Formula"));

        assert_same(&container, &Container::read_yaml(text.as_bytes()).unwrap());
    }

    #[test]
    fn bad_headers() {
        assert!(matches!(
            Container::read_binary(&b""[..]),
            Err(Error::General(_))
        ));
        assert!(matches!(
            Container::read_binary(&b"PineAPPL\x01\0\0\0\0\0\0\0"[..]),
            Err(Error::General(msg)) if msg == "not a container file"
        ));
        assert!(matches!(
            Container::read_binary(&b"TAUSFCON\x63\0\0\0\0\0\0\0"[..]),
            Err(Error::General(msg)) if msg == "file version 99 is not supported"
        ));
    }

    #[test]
    fn format_from_path() {
        assert_eq!(Format::from_path(Path::new("out/sf.yaml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("sf.yml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("sf.bin.lz4")), Format::Lz4);
        assert_eq!(Format::from_path(Path::new("sf.bin")), Format::Binary);
        assert_eq!(Format::from_path(Path::new("sf")), Format::Binary);
    }
}
