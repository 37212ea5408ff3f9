//! VT 인덱스

use std::collections::BTreeMap;

use tracing::warn;

use ironscan_core::types::VtDescriptor;

/// OID로 조회 가능한 VT 디스크립터 모음
///
/// 한 번 만들어진 인덱스는 변경되지 않습니다. 피드 갱신 시 새 인덱스로 통째로 교체됩니다.
#[derive(Debug, Clone, Default)]
pub struct VtIndex {
    vts: BTreeMap<String, VtDescriptor>,
}

impl VtIndex {
    /// 디스크립터 목록으로 인덱스를 만듭니다.
    ///
    /// 같은 OID가 여러 번 나오면 나중 것이 이깁니다.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = VtDescriptor>) -> Self {
        let mut vts = BTreeMap::new();
        for vt in descriptors {
            if let Some(prev) = vts.get(&vt.oid).map(|p: &VtDescriptor| p.filename.clone()) {
                warn!(oid = %vt.oid, previous = %prev, current = %vt.filename, "duplicate VT oid, keeping the later one");
            }
            vts.insert(vt.oid.clone(), vt);
        }
        Self { vts }
    }

    /// OID로 조회합니다.
    pub fn get(&self, oid: &str) -> Option<&VtDescriptor> {
        self.vts.get(oid)
    }

    /// OID 순서로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = &VtDescriptor> {
        self.vts.values()
    }

    /// 패밀리가 일치하는 VT만 순회합니다.
    pub fn by_family<'a>(&'a self, family: &'a str) -> impl Iterator<Item = &'a VtDescriptor> + 'a {
        self.vts.values().filter(move |vt| vt.family == family)
    }

    /// VT 수
    pub fn len(&self) -> usize {
        self.vts.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.vts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironscan_core::types::VtRefs;

    fn vt(oid: &str, family: &str, filename: &str) -> VtDescriptor {
        VtDescriptor {
            oid: oid.to_owned(),
            name: format!("vt {oid}"),
            family: family.to_owned(),
            category: "3".to_owned(),
            qod_type: "package".to_owned(),
            severity_vector: None,
            summary: String::new(),
            impact: String::new(),
            affected: String::new(),
            insight: String::new(),
            solution: String::new(),
            solution_type: String::new(),
            vuldetect: String::new(),
            creation_date: None,
            modification_date: None,
            refs: VtRefs::default(),
            filename: filename.to_owned(),
            content_hash: String::new(),
        }
    }

    #[test]
    fn lookup_and_family_filter() {
        let index = VtIndex::from_descriptors([
            vt("1.1", "debian", "a.notus"),
            vt("1.2", "alpine", "b.notus"),
            vt("1.3", "debian", "a.notus"),
        ]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.get("1.2").map(|v| v.family.as_str()), Some("alpine"));
        assert!(index.get("9.9").is_none());
        let debian: Vec<_> = index.by_family("debian").map(|v| v.oid.as_str()).collect();
        assert_eq!(debian, vec!["1.1", "1.3"]);
    }

    #[test]
    fn later_duplicate_wins() {
        let index = VtIndex::from_descriptors([vt("1.1", "debian", "a.notus"), vt("1.1", "debian", "z.notus")]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("1.1").map(|v| v.filename.as_str()), Some("z.notus"));
    }
}
