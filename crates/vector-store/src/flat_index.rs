use crate::error::{Result, VectorStoreError};
use crate::paths::{read_file, write_atomic};
use crate::types::Neighbor;
use std::cmp::Ordering;
use std::path::Path;

const INDEX_MAGIC: &[u8; 4] = b"DRFX";
const INDEX_FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Append-only flat vector index with exact k-NN search by squared Euclidean distance.
///
/// Vectors are stored row-major in one contiguous buffer; a vector's position is its
/// insertion order and never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors
    #[must_use]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            return 0;
        }
        self.data.len() / self.dimension
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Check a vector against the index dimension
    pub fn validate(&self, vector: &[f32]) -> Result<()> {
        validate_vector(vector, self.dimension)
    }

    /// Append vectors in argument order. Either all vectors are added or none.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for vector in vectors {
            self.validate(vector)?;
        }
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Up to `k` nearest vectors ordered by ascending distance, ties by smaller position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.validate(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        // Brute-force search (O(n), exact)
        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: squared_l2(query, vector),
            })
            .collect();

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, compare_neighbors);
            neighbors.truncate(k);
        }
        neighbors.sort_by(compare_neighbors);

        Ok(neighbors)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Self-describing binary form: magic, format version, dimension, count, then
    /// little-endian `f32` values in insertion order.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let dimension = u32::try_from(self.dimension).map_err(|_| {
            VectorStoreError::InvalidInput(format!("dimension {} too large", self.dimension))
        })?;
        let count = self.len() as u64;

        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        out.extend_from_slice(INDEX_MAGIC);
        out.extend_from_slice(&INDEX_FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&dimension.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        for value in &self.data {
            out.extend_from_slice(&value.to_le_bytes());
        }
        Ok(out)
    }

    /// Inverse of [`FlatIndex::to_bytes`]; the error string describes the defect.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < HEADER_LEN || &bytes[0..4] != INDEX_MAGIC {
            return Err("missing index header".to_string());
        }
        let version = read_u32(bytes, 4)?;
        if version != INDEX_FORMAT_VERSION {
            return Err(format!(
                "unsupported index format version {version} (expected {INDEX_FORMAT_VERSION})"
            ));
        }
        let dimension = read_u32(bytes, 8)? as usize;
        if dimension == 0 {
            return Err("index dimension is zero".to_string());
        }
        let count = usize::try_from(read_u64(bytes, 12)?)
            .map_err(|_| "vector count does not fit in memory".to_string())?;

        let expected_len = count
            .checked_mul(dimension)
            .and_then(|values| values.checked_mul(4))
            .and_then(|payload| payload.checked_add(HEADER_LEN))
            .ok_or_else(|| "index size overflows".to_string())?;
        if bytes.len() != expected_len {
            return Err(format!(
                "expected {expected_len} bytes for {count} vectors of dimension {dimension}, found {}",
                bytes.len()
            ));
        }

        let data = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|raw| f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect();
        Ok(Self { dimension, data })
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        write_atomic(path, &bytes, "save index").await?;
        log::debug!("Wrote {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = read_file(path, "load index").await?;
        Self::from_bytes(&bytes).map_err(|message| VectorStoreError::corrupt(path, message))
    }
}

/// Reject empty vectors and vectors whose length is not `dimension`.
pub fn validate_vector(vector: &[f32], dimension: usize) -> Result<()> {
    if vector.is_empty() {
        return Err(VectorStoreError::InvalidInput(
            "empty vector where a vector is required".to_string(),
        ));
    }
    if vector.len() != dimension {
        return Err(VectorStoreError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }
    Ok(())
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.position.cmp(&b.position))
}

#[must_use]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

fn read_u32(bytes: &[u8], offset: usize) -> std::result::Result<u32, String> {
    bytes
        .get(offset..offset + 4)
        .and_then(|raw| raw.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| format!("truncated header at byte {offset}"))
}

fn read_u64(bytes: &[u8], offset: usize) -> std::result::Result<u64, String> {
    bytes
        .get(offset..offset + 8)
        .and_then(|raw| raw.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| format!("truncated header at byte {offset}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn positions(neighbors: &[Neighbor]) -> Vec<usize> {
        neighbors.iter().map(|n| n.position).collect()
    }

    #[test]
    fn test_add_and_search() {
        let mut index = FlatIndex::new(3);
        index
            .add(&[
                vec![1.0, 0.0, 0.0],
                vec![0.9, 0.1, 0.0],
                vec![0.0, 1.0, 0.0],
            ])
            .unwrap();
        assert_eq!(index.len(), 3);

        let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(positions(&results), vec![0, 1]);
        assert_eq!(results[0].distance, 0.0);
        assert!((results[1].distance - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let mut index = FlatIndex::new(2);
        index
            .add(&[
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![0.0, -1.0],
                vec![-1.0, 0.0],
            ])
            .unwrap();

        let results = index.search(&[0.0, 0.0], 4).unwrap();
        assert_eq!(positions(&results), vec![0, 1, 2, 3]);

        let results = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(positions(&results), vec![0, 1]);
    }

    #[test]
    fn test_fewer_than_k_and_empty() {
        let mut index = FlatIndex::new(2);
        assert!(index.search(&[0.0, 0.0], 5).unwrap().is_empty());

        index.add(&[vec![3.0, 4.0]]).unwrap();
        let results = index.search(&[0.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].distance, 25.0);

        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_rejects_whole_batch() {
        let mut index = FlatIndex::new(3);
        let result = index.add(&[vec![1.0, 0.0, 0.0], vec![1.0, 0.0]]);
        assert!(matches!(
            result,
            Err(VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(index.is_empty());

        index.add(&[vec![1.0, 0.0, 0.0]]).unwrap();
        assert!(index.search(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_empty_vector_is_invalid_input() {
        let mut index = FlatIndex::new(3);
        assert!(matches!(
            index.add(&[vec![]]),
            Err(VectorStoreError::InvalidInput(_))
        ));
        assert!(matches!(
            index.search(&[], 1),
            Err(VectorStoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_vector_lookup_and_clear() {
        let mut index = FlatIndex::new(2);
        index.add(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(index.vector(1), Some(&[3.0, 4.0][..]));
        assert_eq!(index.vector(2), None);

        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), 2);
    }

    #[test]
    fn test_bytes_preserve_values_and_order() {
        let mut index = FlatIndex::new(3);
        index
            .add(&[
                vec![0.1, -2.5, f32::MIN_POSITIVE],
                vec![1e-30, 3.0e30, -0.0],
            ])
            .unwrap();

        let restored = FlatIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.dimension(), 3);
        assert_eq!(restored.len(), 2);
        for position in 0..2 {
            let original = index.vector(position).unwrap();
            let loaded = restored.vector(position).unwrap();
            for (a, b) in original.iter().zip(loaded) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }

    #[test]
    fn test_from_bytes_rejects_corruption() {
        let mut index = FlatIndex::new(2);
        index.add(&[vec![1.0, 2.0]]).unwrap();
        let bytes = index.to_bytes().unwrap();

        assert!(FlatIndex::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        assert!(FlatIndex::from_bytes(b"nope").is_err());

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(FlatIndex::from_bytes(&bad_magic).is_err());

        let mut bad_version = bytes;
        bad_version[4] = 9;
        assert!(FlatIndex::from_bytes(&bad_version).is_err());
    }

    #[tokio::test]
    async fn test_save_and_load_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.flat");

        let mut index = FlatIndex::new(4);
        index
            .add(&[vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]])
            .unwrap();
        index.save(&path).await.unwrap();

        let loaded = FlatIndex::load(&path).await.unwrap();
        assert_eq!(loaded, index);
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_corrupt_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.flat");
        tokio::fs::write(&path, b"DRFXgarbage").await.unwrap();

        let err = FlatIndex::load(&path).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::CorruptStore { .. }));
    }
}
