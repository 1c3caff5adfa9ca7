//! # depscan-extractors
//!
//! One extractor per manifest format, all producing the uniform
//! [`depscan_core::Dependency`] record, plus the registry that maps a
//! file path to the extractor responsible for it.
//!
//! Extractors are synchronous pure parsers; the scan engine drives them
//! from worker threads. None of them evaluates manifest source: Gradle,
//! SCons, and `conanfile.py` are scanned textually.

#![warn(missing_docs)]

pub mod config;
pub mod registry;

mod util;

mod ant;
mod autoconf;
mod bazel;
mod buck;
mod cargo;
mod carthage;
mod cmake;
mod cocoapods;
mod composer;
mod conan;
mod control;
mod gradle;
mod make;
mod maven;
mod meson;
mod ninja;
mod npm;
mod nuget;
mod pkgconfig;
mod poetry;
mod scons;
mod spm;
mod submodule;
mod vcpkg;
mod yarn;

pub use ant::AntExtractor;
pub use autoconf::AutoconfExtractor;
pub use bazel::BazelExtractor;
pub use buck::BuckExtractor;
pub use cargo::CargoExtractor;
pub use carthage::CarthageExtractor;
pub use cmake::CmakeExtractor;
pub use cocoapods::CocoapodsExtractor;
pub use composer::ComposerExtractor;
pub use conan::ConanExtractor;
pub use config::ExtractorConfig;
pub use control::ControlExtractor;
pub use gradle::GradleExtractor;
pub use make::MakeExtractor;
pub use maven::MavenExtractor;
pub use meson::MesonExtractor;
pub use ninja::NinjaExtractor;
pub use npm::NpmExtractor;
pub use nuget::NugetExtractor;
pub use pkgconfig::PkgConfigExtractor;
pub use poetry::PoetryExtractor;
pub use registry::{Extractor, ExtractorFactory, ExtractorKind, ExtractorRegistry};
pub use scons::SconsExtractor;
pub use spm::SpmExtractor;
pub use submodule::SubmoduleExtractor;
pub use vcpkg::VcpkgExtractor;
pub use yarn::YarnExtractor;

use std::sync::Arc;

/// The standard `(kind, factory)` table, in registration order.
///
/// Registration order is the dispatch tie-breaker, so this order is
/// part of the observable contract.
pub fn standard_factories() -> Vec<(ExtractorKind, ExtractorFactory)> {
    vec![
        (ExtractorKind::Cmake, |c| Arc::new(CmakeExtractor::new(c))),
        (ExtractorKind::Make, |c| Arc::new(MakeExtractor::new(c))),
        (ExtractorKind::Ninja, |c| Arc::new(NinjaExtractor::new(c))),
        (ExtractorKind::Meson, |c| Arc::new(MesonExtractor::new(c))),
        (ExtractorKind::Autoconf, |c| {
            Arc::new(AutoconfExtractor::new(c))
        }),
        (ExtractorKind::PkgConfig, |c| {
            Arc::new(PkgConfigExtractor::new(c))
        }),
        (ExtractorKind::Control, |c| Arc::new(ControlExtractor::new(c))),
        (ExtractorKind::Conan, |c| Arc::new(ConanExtractor::new(c))),
        (ExtractorKind::Vcpkg, |c| Arc::new(VcpkgExtractor::new(c))),
        (ExtractorKind::Bazel, |c| Arc::new(BazelExtractor::new(c))),
        (ExtractorKind::Buck, |c| Arc::new(BuckExtractor::new(c))),
        (ExtractorKind::Scons, |c| Arc::new(SconsExtractor::new(c))),
        (ExtractorKind::Gradle, |c| Arc::new(GradleExtractor::new(c))),
        (ExtractorKind::Maven, |c| Arc::new(MavenExtractor::new(c))),
        (ExtractorKind::Ant, |c| Arc::new(AntExtractor::new(c))),
        (ExtractorKind::Npm, |c| Arc::new(NpmExtractor::new(c))),
        (ExtractorKind::Yarn, |c| Arc::new(YarnExtractor::new(c))),
        (ExtractorKind::Cargo, |c| Arc::new(CargoExtractor::new(c))),
        (ExtractorKind::Poetry, |c| Arc::new(PoetryExtractor::new(c))),
        (ExtractorKind::Composer, |c| {
            Arc::new(ComposerExtractor::new(c))
        }),
        (ExtractorKind::Nuget, |c| Arc::new(NugetExtractor::new(c))),
        (ExtractorKind::Cocoapods, |c| {
            Arc::new(CocoapodsExtractor::new(c))
        }),
        (ExtractorKind::Carthage, |c| {
            Arc::new(CarthageExtractor::new(c))
        }),
        (ExtractorKind::Spm, |c| Arc::new(SpmExtractor::new(c))),
        (ExtractorKind::Submodule, |c| {
            Arc::new(SubmoduleExtractor::new(c))
        }),
    ]
}
