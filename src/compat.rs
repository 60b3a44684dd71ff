//! Decides which release asset can be installed on this host.
//!
//! Asset names are matched against an ordered list of rejection rules; the
//! first rule that objects produces the verdict's reason.

use crate::error::{ResolveError, ResolveResult};
use crate::platform::{detect_host_arch, ArchProbe};
use crate::types::{ArchiveKind, CompatibilityVerdict, Rejection, Release, ReleaseAsset};

const WINDOWS_MARKERS: &[&str] = &["windows", "-pc-", ".exe"];
const ARCHIVE_EXTS: &[&str] = &[".tar.gz", ".tgz", ".zip"];
const X86_64_MARKERS: &[&str] = &["x86_64", "amd64"];
const FOREIGN_ARCH_MARKERS: &[&str] = &["386", "arm64", "aarch64", "arm"];
const LINUX_MARKERS: &[&str] = &["linux", "unknown-linux"];
const PACKAGE_MARKERS: &[&str] = &[".deb", ".rpm", ".apk", ".pkg.tar.", ".pacman"];

const COMPATIBLE: &str = "Compatible binary found";

/// A rejection rule: lowercased asset name and host arch in, reason out.
type Rule = fn(&str, &str) -> Option<String>;

const RULES: &[Rule] = &[
    reject_windows,
    reject_unsupported_archive,
    reject_foreign_arch,
    reject_non_linux,
    reject_package,
];

fn first_marker<'a>(name: &str, markers: &[&'a str]) -> Option<&'a str> {
    markers.iter().copied().find(|m| name.contains(m))
}

fn reject_windows(name: &str, _arch: &str) -> Option<String> {
    first_marker(name, WINDOWS_MARKERS).map(|_| "Windows binary detected".to_string())
}

fn reject_unsupported_archive(name: &str, _arch: &str) -> Option<String> {
    match first_marker(name, ARCHIVE_EXTS) {
        Some(_) => None,
        None => Some("Not a supported archive format".to_string()),
    }
}

fn reject_foreign_arch(name: &str, arch: &str) -> Option<String> {
    if arch != "x86_64" {
        return None;
    }
    if first_marker(name, X86_64_MARKERS).is_none() {
        return Some("Architecture doesn't match x86_64/amd64".to_string());
    }
    first_marker(name, FOREIGN_ARCH_MARKERS)
        .map(|m| format!("Found incompatible architecture indicator: {}", m))
}

fn reject_non_linux(name: &str, _arch: &str) -> Option<String> {
    match first_marker(name, LINUX_MARKERS) {
        Some(_) => None,
        None => Some("Not a Linux binary".to_string()),
    }
}

fn reject_package(name: &str, _arch: &str) -> Option<String> {
    first_marker(name, PACKAGE_MARKERS).map(|m| format!("Package format detected: {}", m))
}

#[derive(Debug, Clone)]
pub struct AssetFilter {
    host_arch: String,
}

impl AssetFilter {
    /// Probes the host architecture once; failures fall back to `x86_64`.
    pub fn new(probe: &dyn ArchProbe) -> Self {
        Self {
            host_arch: detect_host_arch(probe),
        }
    }

    pub fn host_arch(&self) -> &str {
        &self.host_arch
    }

    pub fn is_compatible(&self, asset_name: &str) -> CompatibilityVerdict {
        let name = asset_name.to_lowercase();
        RULES
            .iter()
            .find_map(|rule| rule(&name, &self.host_arch))
            .map(CompatibilityVerdict::reject)
            .unwrap_or_else(|| CompatibilityVerdict::accept(COMPATIBLE))
    }

    /// Picks the installable asset, preferring one that carries the program
    /// name. The returned kind may still be `Unknown`.
    pub fn find_linux_binary(
        &self,
        assets: &[ReleaseAsset],
        program_name: &str,
    ) -> Option<(ReleaseAsset, ArchiveKind)> {
        tracing::debug!(
            program = program_name,
            "Searching for Linux binary among {} assets",
            assets.len()
        );

        let mut compatible = Vec::new();
        for asset in assets {
            let verdict = self.is_compatible(&asset.name);
            tracing::debug!(
                program = program_name,
                asset = %asset.name,
                compatible = verdict.is_compatible,
                reason = %verdict.reason,
                "Checked asset"
            );
            if verdict.is_compatible {
                compatible.push(asset);
            }
        }

        let wanted = program_name.to_lowercase();
        let chosen = compatible
            .iter()
            .find(|asset| asset.name.to_lowercase().contains(&wanted))
            .or_else(|| compatible.first())?;

        tracing::info!(program = program_name, asset = %chosen.name, "Selected asset");
        Some(((*chosen).clone(), ArchiveKind::from_name(&chosen.name)))
    }

    /// Like [`find_linux_binary`](Self::find_linux_binary), but reports every
    /// rejection when nothing fits and refuses assets of unknown kind.
    pub fn resolve(
        &self,
        release: &Release,
        program_name: &str,
    ) -> ResolveResult<(ReleaseAsset, ArchiveKind)> {
        let Some((asset, kind)) = self.find_linux_binary(&release.assets, program_name) else {
            let rejected = release
                .assets
                .iter()
                .map(|asset| Rejection {
                    asset: asset.name.clone(),
                    reason: self.is_compatible(&asset.name).reason,
                })
                .collect();
            return Err(ResolveError::NoCompatibleAsset {
                tag: release.tag_name.clone(),
                rejected,
            });
        };

        if kind == ArchiveKind::Unknown {
            return Err(ResolveError::UnsupportedArchiveFormat { asset: asset.name });
        }
        Ok((asset, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FixedArch;

    fn assets(names: &[&str]) -> Vec<ReleaseAsset> {
        names
            .iter()
            .map(|n| ReleaseAsset {
                name: n.to_string(),
                download_url: format!("https://example.com/{}", n),
            })
            .collect()
    }

    fn filter_for(arch: &str) -> AssetFilter {
        AssetFilter::new(&FixedArch::new(arch))
    }

    fn reason(filter: &AssetFilter, name: &str) -> String {
        filter.is_compatible(name).reason
    }

    #[test]
    fn rules_report_first_failure() {
        let filter = filter_for("x86_64");

        assert_eq!(reason(&filter, "tool-windows-amd64.zip"), "Windows binary detected");
        assert_eq!(reason(&filter, "tool-x86_64-pc-linux.tar.gz"), "Windows binary detected");
        assert_eq!(reason(&filter, "tool-linux-amd64.exe.zip"), "Windows binary detected");
        assert_eq!(reason(&filter, "tool.deb"), "Not a supported archive format");
        assert_eq!(
            reason(&filter, "tool-aarch64-unknown-linux-gnu.tar.gz"),
            "Architecture doesn't match x86_64/amd64"
        );
        assert_eq!(
            reason(&filter, "tool-linux-amd64-arm64.tar.gz"),
            "Found incompatible architecture indicator: arm64"
        );
        assert_eq!(
            reason(&filter, "tool-darwin-amd64.tar.gz"),
            "Not a Linux binary"
        );
        assert_eq!(
            reason(&filter, "tool-x86_64-linux.pkg.tar.gz"),
            "Package format detected: .pkg.tar."
        );
        assert_eq!(
            reason(&filter, "tool-x86_64-unknown-linux-musl.tgz"),
            "Compatible binary found"
        );
    }

    #[test]
    fn arch_token_inside_a_word_still_rejects() {
        let filter = filter_for("x86_64");
        let verdict = filter.is_compatible("swarm-linux-amd64.tar.gz");
        assert!(!verdict.is_compatible);
        assert_eq!(verdict.reason, "Found incompatible architecture indicator: arm");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let filter = filter_for("x86_64");
        assert!(filter.is_compatible("Tool-Linux-AMD64.TAR.GZ").is_compatible);
        assert!(!filter.is_compatible("Tool-WINDOWS-amd64.zip").is_compatible);
    }

    #[test]
    fn arch_rule_only_applies_on_x86_64_hosts() {
        let filter = filter_for("aarch64");
        assert!(filter.is_compatible("tool-aarch64-unknown-linux-gnu.tar.gz").is_compatible);
        assert!(filter.is_compatible("tool-x86_64-unknown-linux-gnu.tar.gz").is_compatible);
    }

    #[test]
    fn verdict_is_repeatable() {
        let filter = filter_for("x86_64");
        let name = "tool-linux-arm64.tar.gz";
        assert_eq!(filter.is_compatible(name), filter.is_compatible(name));
    }

    #[test]
    fn filter_uses_injected_probe() {
        let filter = AssetFilter::new(&FixedArch::new("riscv64"));
        assert_eq!(filter.host_arch(), "riscv64");
    }

    #[test]
    fn finds_x86_64_tarball_among_mixed_assets() {
        let filter = filter_for("x86_64");
        let list = assets(&[
            "tool-x86_64-unknown-linux-gnu.tar.gz",
            "tool-aarch64-unknown-linux-gnu.tar.gz",
            "tool.deb",
        ]);

        let (asset, kind) = filter.find_linux_binary(&list, "tool").unwrap();
        assert_eq!(asset.name, "tool-x86_64-unknown-linux-gnu.tar.gz");
        assert_eq!(kind, ArchiveKind::Tar);
    }

    #[test]
    fn windows_zip_is_skipped() {
        let filter = filter_for("x86_64");
        let list = assets(&["tool-windows-amd64.zip", "tool-linux-amd64.zip"]);

        assert!(!filter.is_compatible(&list[0].name).is_compatible);
        assert!(filter.is_compatible(&list[1].name).is_compatible);

        let (asset, kind) = filter.find_linux_binary(&list, "tool").unwrap();
        assert_eq!(asset.name, "tool-linux-amd64.zip");
        assert_eq!(kind, ArchiveKind::Zip);
    }

    #[test]
    fn prefers_asset_named_after_program() {
        let filter = filter_for("x86_64");
        let list = assets(&[
            "helper-linux-amd64.tar.gz",
            "Delta-linux-amd64.tar.gz",
        ]);

        let (asset, _) = filter.find_linux_binary(&list, "delta").unwrap();
        assert_eq!(asset.name, "Delta-linux-amd64.tar.gz");

        let (asset, _) = filter.find_linux_binary(&list, "other").unwrap();
        assert_eq!(asset.name, "helper-linux-amd64.tar.gz");
    }

    #[test]
    fn nothing_compatible_yields_none() {
        let filter = filter_for("x86_64");
        let list = assets(&["tool.exe", "tool-darwin-arm64.tar.gz"]);
        assert!(filter.find_linux_binary(&list, "tool").is_none());
        assert!(filter.find_linux_binary(&[], "tool").is_none());
    }

    #[test]
    fn unexpected_suffix_position_maps_to_unknown_kind() {
        let filter = filter_for("x86_64");
        let list = assets(&["tool-linux-amd64.tar.gz.sig"]);

        let (_, kind) = filter.find_linux_binary(&list, "tool").unwrap();
        assert_eq!(kind, ArchiveKind::Unknown);

        let release = Release {
            tag_name: "v1".to_string(),
            assets: list,
            published_at: None,
            html_url: None,
            body: None,
        };
        let err = filter.resolve(&release, "tool").unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedArchiveFormat { asset } if asset == "tool-linux-amd64.tar.gz.sig"));
    }

    #[test]
    fn resolve_lists_every_rejection() {
        let filter = filter_for("x86_64");
        let release = Release {
            tag_name: "v2.0.0".to_string(),
            assets: assets(&["tool-windows-amd64.zip", "checksums.txt"]),
            published_at: None,
            html_url: None,
            body: None,
        };

        match filter.resolve(&release, "tool") {
            Err(ResolveError::NoCompatibleAsset { tag, rejected }) => {
                assert_eq!(tag, "v2.0.0");
                assert_eq!(
                    rejected,
                    vec![
                        Rejection {
                            asset: "tool-windows-amd64.zip".to_string(),
                            reason: "Windows binary detected".to_string(),
                        },
                        Rejection {
                            asset: "checksums.txt".to_string(),
                            reason: "Not a supported archive format".to_string(),
                        },
                    ]
                );
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
