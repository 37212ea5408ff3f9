//! 어드바이저리 파일(`*.notus`) 파싱 및 VT 디스크립터 변환

use serde::Deserialize;

use ironscan_core::types::{VtDescriptor, VtRefs};

/// 어드바이저리 파일 확장자
pub const ADVISORY_EXTENSION: &str = "notus";

const DEFAULT_QOD_TYPE: &str = "package";
const CATEGORY: &str = "3";
const SOLUTION: &str = "Please install the updated package(s).";
const SOLUTION_TYPE: &str = "VendorFix";
const VULDETECT: &str = "Checks if a vulnerable package version is present on the target host.";

#[derive(Debug, Deserialize)]
struct AdvisoryFile {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    qod_type: Option<String>,
    #[serde(default)]
    advisories: Vec<Advisory>,
}

#[derive(Debug, Deserialize)]
struct Advisory {
    oid: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    creation_date: Option<i64>,
    #[serde(default)]
    last_modification: Option<i64>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    impact: String,
    #[serde(default)]
    affected: String,
    #[serde(default)]
    insight: String,
    #[serde(default)]
    severity: AdvisorySeverity,
    #[serde(default)]
    cves: Vec<String>,
    #[serde(default)]
    xrefs: Vec<String>,
    #[serde(default)]
    advisory_xref: Option<String>,
    #[serde(default)]
    advisory_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdvisorySeverity {
    #[serde(default)]
    cvss_v3: Option<String>,
    #[serde(default)]
    cvss_v2: Option<String>,
}

/// 어드바이저리 파일 하나를 VT 디스크립터 목록으로 변환합니다.
///
/// `stem`은 파일에 `family`가 없을 때 패밀리로 쓰입니다.
pub fn parse_advisories(
    content: &[u8],
    filename: &str,
    stem: &str,
    content_hash: &str,
) -> Result<Vec<VtDescriptor>, String> {
    let file: AdvisoryFile = serde_json::from_slice(content).map_err(|e| e.to_string())?;

    let family = file.family.unwrap_or_else(|| stem.to_owned());
    let qod_type = file.qod_type.unwrap_or_else(|| DEFAULT_QOD_TYPE.to_owned());

    Ok(file
        .advisories
        .into_iter()
        .map(|adv| {
            let mut url = Vec::with_capacity(adv.xrefs.len() + 1);
            url.extend(adv.advisory_xref.filter(|x| !x.is_empty()));
            url.extend(adv.xrefs);

            VtDescriptor {
                oid: adv.oid,
                name: adv.title,
                family: family.clone(),
                category: CATEGORY.to_owned(),
                qod_type: qod_type.clone(),
                severity_vector: adv.severity.cvss_v3.or(adv.severity.cvss_v2),
                summary: adv.summary,
                impact: adv.impact,
                affected: adv.affected,
                insight: adv.insight,
                solution: SOLUTION.to_owned(),
                solution_type: SOLUTION_TYPE.to_owned(),
                vuldetect: VULDETECT.to_owned(),
                creation_date: Some(adv.creation_date.unwrap_or(0)),
                modification_date: Some(adv.last_modification.unwrap_or(0)),
                refs: VtRefs {
                    url,
                    cve: adv.cves,
                    advisory_id: adv.advisory_id.into_iter().collect(),
                },
                filename: filename.to_owned(),
                content_hash: content_hash.to_owned(),
            }
        })
        .collect())
}
