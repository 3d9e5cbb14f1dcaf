//! The sparse, page-allocated-on-first-write address space backing [crate::State].

use crate::{
    page::{self, CachedPage},
    utils::concat_fixed,
    Address, Gindex, PageIndex,
};
use alloy_primitives::{hex, keccak256, B256};
use anyhow::Result;
use fnv::FnvHashMap;
use serde::{
    de::Error as _, ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer,
};
use std::{collections::HashMap, io::Read};

/// The 896-bit (28 x 32 byte) sibling path from a touched word up to the memory root.
pub type MemProof = [u8; 28 << 5];

/// [Memory] is the MIPS emulator's paged, Merkle-friendly address space. Pages are allocated on
/// first write; reads of unallocated pages return zero. The root is stable across no-op writes.
#[derive(Debug, Clone)]
pub struct Memory {
    /// Generalized index -> cached subtree root. `None` marks an invalidated node.
    nodes: FnvHashMap<Gindex, Option<B256>>,
    /// Page index -> page contents.
    pages: FnvHashMap<PageIndex, CachedPage>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            nodes: FnvHashMap::default(),
            pages: FnvHashMap::default(),
        }
    }
}

impl Memory {
    /// The number of allocated pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Total bytes currently backed by allocated pages.
    pub fn usage(&self) -> u64 {
        (self.pages.len() * page::PAGE_SIZE) as u64
    }

    /// Invalidate a word address, dirtying every ancestor node up to the root.
    fn invalidate(&mut self, address: Address) -> Result<()> {
        if address & 0x3 != 0 {
            anyhow::bail!("Unaligned memory access: {:x}", address);
        }

        let page_index = address >> page::PAGE_ADDRESS_SIZE as u64;
        match self.pages.get_mut(&page_index) {
            Some(page) => {
                page.invalidate((address & page::PAGE_ADDRESS_MASK as u64) as u32);
            }
            None => return Ok(()),
        }

        let mut g_index = (1u64 << page::PAGE_KEY_SIZE) | page_index;
        while g_index > 0 {
            self.nodes.insert(g_index, None);
            g_index >>= 1;
        }

        Ok(())
    }

    fn merklize_subtree(&mut self, g_index: Gindex) -> Result<B256> {
        let bits = 64 - g_index.leading_zeros();
        if bits > 28 {
            anyhow::bail!("Gindex is too deep");
        }

        if bits as usize > page::PAGE_KEY_SIZE {
            let depth_into_page = bits as usize - 1 - page::PAGE_KEY_SIZE;
            let page_index = (g_index >> depth_into_page) & page::PAGE_KEY_MASK as u64;
            return match self.pages.get_mut(&page_index) {
                Some(page) => {
                    let page_g_index =
                        (1u64 << depth_into_page) | (g_index & ((1u64 << depth_into_page) - 1));
                    Ok(page.merklize_subtree(page_g_index as usize))
                }
                None => Ok(page::ZERO_HASHES[28 - bits as usize]),
            };
        }

        if bits as usize > page::PAGE_KEY_SIZE + 1 {
            anyhow::bail!("Cannot jump into intermediate node of page");
        }

        if let Some(Some(node)) = self.nodes.get(&g_index) {
            return Ok(*node);
        }
        if !self.nodes.contains_key(&g_index) {
            return Ok(page::ZERO_HASHES[28 - bits as usize]);
        }

        let left = self.merklize_subtree(g_index << 1)?;
        let right = self.merklize_subtree((g_index << 1) | 1)?;
        let result = keccak256(concat_fixed(left.into(), right.into()));

        self.nodes.insert(g_index, Some(result));

        Ok(result)
    }

    /// Compute the Merkle root over the whole address space.
    pub fn merkle_root(&mut self) -> Result<B256> {
        self.merklize_subtree(1)
    }

    /// Compute the sibling path for `address`, from leaf to root.
    pub fn proof(&mut self, address: Address) -> Result<MemProof> {
        let proof = self.traverse_branch(1, address, 0)?;
        let mut proof_out = [0u8; 28 << 5];
        for (i, node) in proof.iter().enumerate() {
            let start = i << 5;
            proof_out[start..start + 32].copy_from_slice(node.as_slice());
        }
        Ok(proof_out)
    }

    fn traverse_branch(&mut self, parent: Gindex, address: Address, depth: u8) -> Result<Vec<B256>> {
        if depth == 32 - 5 {
            return Ok(vec![self.merklize_subtree(parent)?]);
        }
        if depth > 32 - 5 {
            anyhow::bail!("Traversed too deep");
        }

        let mut local = parent << 1;
        let mut sibling = local | 1;
        if address & (1 << (31 - depth)) != 0 {
            (local, sibling) = (sibling, local);
        }

        let mut proof = self.traverse_branch(local, address, depth + 1)?;
        let sibling_node = self.merklize_subtree(sibling)?;
        proof.push(sibling_node);
        Ok(proof)
    }

    /// Write a big-endian 32-bit word at `address`, allocating its page if necessary.
    pub fn write32(&mut self, address: Address, value: u32) -> Result<()> {
        if address & 0x3 != 0 {
            anyhow::bail!("Unaligned memory access: {:x}", address);
        }

        let page_index = address >> page::PAGE_ADDRESS_SIZE as u64;
        let page_offset = address as usize & page::PAGE_ADDRESS_MASK;

        if !self.pages.contains_key(&page_index) {
            self.alloc_page(page_index);
        }
        self.invalidate(address)?;

        let page = self.pages.get_mut(&page_index).expect("just allocated");
        page.data[page_offset..page_offset + 4].copy_from_slice(&value.to_be_bytes());

        Ok(())
    }

    /// Read a big-endian 32-bit word at `address`. Unallocated pages read as zero.
    pub fn read32(&self, address: Address) -> Result<u32> {
        if address & 0x3 != 0 {
            anyhow::bail!("Unaligned memory access: {:x}", address);
        }

        let page_index = address >> page::PAGE_ADDRESS_SIZE as u64;
        match self.pages.get(&page_index) {
            Some(page) => {
                let offset = address as usize & page::PAGE_ADDRESS_MASK;
                Ok(u32::from_be_bytes(page.data[offset..offset + 4].try_into()?))
            }
            None => Ok(0),
        }
    }

    /// Write a contiguous byte range starting at `address`, reading from `r` until EOF.
    pub fn set_memory_range(&mut self, address: Address, mut r: impl Read) -> Result<()> {
        let mut addr = address;
        loop {
            let page_index = addr >> page::PAGE_ADDRESS_SIZE as u64;
            let page_offset = addr as usize & page::PAGE_ADDRESS_MASK;

            if !self.pages.contains_key(&page_index) {
                self.alloc_page(page_index);
            }
            self.invalidate(addr & !0x3)?;

            let page = self.pages.get_mut(&page_index).expect("just allocated");
            let n = r.read(&mut page.data[page_offset..])?;
            if n == 0 {
                return Ok(());
            }
            addr += n as u64;
        }
    }

    fn alloc_page(&mut self, page_index: PageIndex) {
        self.pages.insert(page_index, CachedPage::default());

        let mut key = (1u64 << page::PAGE_KEY_SIZE) | page_index;
        while key > 0 {
            self.nodes.insert(key, None);
            key >>= 1;
        }
    }
}

/// Serialized as the §6.1 "page map": page index (decimal string) -> `0x`-prefixed hex page
/// bytes. The Merkle cache is derived data and is rebuilt on load, not persisted.
impl Serialize for Memory {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.pages.len()))?;
        for (page_index, page) in &self.pages {
            map.serialize_entry(&page_index.to_string(), &hex::encode_prefixed(page.data))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Memory {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = HashMap::<String, String>::deserialize(deserializer)?;
        let mut memory = Memory::default();
        for (key, value) in raw {
            let page_index: PageIndex = key.parse().map_err(D::Error::custom)?;
            let bytes = hex::decode(&value).map_err(D::Error::custom)?;
            if bytes.len() != page::PAGE_SIZE {
                return Err(D::Error::custom("page data has the wrong length"));
            }

            let mut page = CachedPage::default();
            page.data.copy_from_slice(&bytes);
            memory.pages.insert(page_index, page);

            let mut g_index = (1u64 << page::PAGE_KEY_SIZE) | page_index;
            while g_index > 0 {
                memory.nodes.insert(g_index, None);
                g_index >>= 1;
            }
        }
        Ok(memory)
    }
}

#[cfg(test)]
mod test {
    use super::Memory;
    use crate::utils::concat_fixed;
    use alloy_primitives::{keccak256, B256};

    #[test]
    fn memory_merkle_proof_leaf() {
        let mut memory = Memory::default();
        memory.write32(0x10000, 0xaabbccdd).unwrap();
        let proof = memory.proof(0x10000).unwrap();
        assert_eq!([0xaa, 0xbb, 0xcc, 0xdd], proof[..4]);
        for i in 0..32 - 5 {
            let start = 32 + i * 32;
            assert_eq!(crate::page::ZERO_HASHES[i], proof[start..start + 32]);
        }
    }

    #[test]
    fn memory_merkle_proof_verifies_against_root() {
        let mut memory = Memory::default();
        memory.write32(0x10000, 0xaabbccdd).unwrap();
        memory.write32(0x80004, 42).unwrap();
        memory.write32(0x13370000, 123).unwrap();
        let root = memory.merkle_root().unwrap();
        let proof = memory.proof(0x80004).unwrap();
        assert_eq!([0x00, 0x00, 0x00, 0x2a], proof[4..8]);

        let mut node: B256 = proof[..32].try_into().unwrap();
        let mut path = 0x80004u64 >> 5;
        for i in (32..proof.len()).step_by(32) {
            let sib: B256 = proof[i..i + 32].try_into().unwrap();
            node = if path & 1 != 0 {
                keccak256(concat_fixed(sib.into(), node.into()))
            } else {
                keccak256(concat_fixed(node.into(), sib.into()))
            };
            path >>= 1;
        }
        assert_eq!(root, node, "proof must verify against the root");
    }

    #[test]
    fn unallocated_reads_are_zero() {
        let memory = Memory::default();
        assert_eq!(memory.read32(0x1000).unwrap(), 0);
        assert_eq!(memory.page_count(), 0);
    }

    #[test]
    fn root_stable_under_noop_write() {
        let mut memory = Memory::default();
        memory.write32(0x1000, 7).unwrap();
        let before = memory.merkle_root().unwrap();
        memory.write32(0x1000, 7).unwrap();
        let after = memory.merkle_root().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn set_memory_range_writes_contiguous_bytes() {
        let mut memory = Memory::default();
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        memory.set_memory_range(0x2000, &data[..]).unwrap();
        assert_eq!(memory.read32(0x2000).unwrap(), 0x01020304);
        assert_eq!(memory.read32(0x2004).unwrap(), 0x05060708);
    }
}
