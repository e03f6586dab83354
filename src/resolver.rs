//! The backtracking search: the resolver's core. Single-threaded,
//! synchronous, and deterministic — given identical inputs, identical
//! [`MetadataProvider`] responses, and identical options, it always
//! produces the identical [`Solution`] (including the order candidates are
//! examined in).
//!
//! The search is implemented as an explicit stack of [`Frame`]s rather
//! than native recursion, per the redesign note in `SPEC_FULL.md` §9: each
//! frame owns a snapshot of the search state from just before it started
//! trying candidates for one package name, so backtracking is "restore the
//! snapshot, try the next candidate" rather than unwinding call frames.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::constraint::Constraint;
use crate::core::error::{BlameLink, RverseError};
use crate::package::{Candidate, EdgeKind, PackageRef, Requirement, Source};
use crate::provider::MetadataProvider;
use crate::solution::{DowngradeEntry, Solution, SourceSummary};
use crate::version::Version;

/// Inputs that don't change over the course of one `resolve` call.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// The R version currently installed; used only for the
    /// upgrade/downgrade report, never as a hard filter (see
    /// `DESIGN.md` for why `current_r` isn't treated as a ceiling).
    pub current_r: Option<Version>,
    /// A hard ceiling: no selected candidate may have `r_floor > lock_r`.
    pub lock_r: Option<Version>,
    /// Biases which Bioconductor release a provider consults when a
    /// Requirement doesn't pin one explicitly; never overrides an
    /// explicit `bioc_release` on a Requirement.
    pub prefer_bioc_release: Option<String>,
    /// Whether `suggests` edges are active in addition to
    /// `depends`/`imports`/`linking_to`.
    pub include_optional: bool,
}

/// Per-name bookkeeping the search accumulates as it discovers packages.
#[derive(Debug, Clone, Default)]
struct SearchState {
    assignment: HashMap<String, Candidate>,
    constraints: HashMap<String, Constraint>,
    package_refs: HashMap<String, PackageRef>,
    open: HashSet<String>,
    /// Every contribution merged into a name's constraint so far, in the
    /// order they were merged — the raw material for a `VersionConflict`'s
    /// blaming chain.
    contributions: HashMap<String, Vec<BlameLink>>,
}

impl SearchState {
    fn contribute(&mut self, name: &str, link: BlameLink) {
        self.contributions.entry(name.to_string()).or_default().push(link);
    }
}

/// One point in the backtracking search: the candidates left to try for
/// `name`, and the state exactly as it was before any of them were tried.
struct Frame {
    name: String,
    remaining: Vec<Candidate>,
    snapshot: SearchState,
}

/// Run the backtracking search to completion.
///
/// `cancel` is polled once per commit boundary (§5's cooperative
/// cancellation); pass `|| false` for an uncancellable resolve.
pub fn resolve(
    requirements: &[Requirement],
    provider: &dyn MetadataProvider,
    options: &ResolveOptions,
    cancel: impl Fn() -> bool,
) -> Result<Solution, RverseError> {
    let mut state = SearchState::default();
    let mut root_names: HashSet<String> = HashSet::new();
    let mut root_sources: HashMap<String, Source> = HashMap::new();

    for req in requirements {
        let name = req.package_ref.name.clone();
        if let Some(existing_source) = root_sources.get(&name) {
            if *existing_source != req.package_ref.source {
                return Err(RverseError::SourceConflict {
                    name,
                    first: existing_source.to_string(),
                    second: req.package_ref.source.to_string(),
                });
            }
        } else {
            root_sources.insert(name.clone(), req.package_ref.source);
        }

        root_names.insert(name.clone());
        state
            .package_refs
            .entry(name.clone())
            .or_insert_with(|| req.package_ref.clone());
        let merged = state
            .constraints
            .get(&name)
            .cloned()
            .unwrap_or_default()
            .merge(&req.constraint);
        state.contribute(
            &name,
            BlameLink {
                parent: "<project>".to_string(),
                kind: EdgeKind::Depends,
                constraint: req.constraint.to_string(),
            },
        );
        state.constraints.insert(name.clone(), merged);
        state.open.insert(name);
    }

    let mut stack: Vec<Frame> = Vec::new();
    let mut last_conflict: Option<RverseError> = None;

    loop {
        if cancel() {
            return Err(RverseError::Cancelled);
        }

        if state.open.is_empty() {
            return Ok(build_solution(state, options));
        }

        let name = pick_next(&state, &root_names, provider, options)?;
        state.open.remove(&name);

        let package_ref = state.package_refs[&name].clone();
        let raw = provider.candidates(&package_ref)?;
        debug!(package = %package_ref, candidates = raw.len(), "queried provider");

        if raw.is_empty() && root_names.contains(&name) {
            return Err(RverseError::UnknownPackage {
                name,
                source: package_ref.source.to_string(),
            });
        }

        let constraint = state.constraints[&name].clone();
        let (ordered, conflict) = order_candidates(raw, &constraint, &name, options);
        if let Some(c) = conflict {
            last_conflict = Some(c);
        } else if ordered.is_empty() {
            last_conflict = Some(RverseError::VersionConflict {
                name: name.clone(),
                constraint: constraint.to_string(),
                chain: state.contributions.get(&name).cloned().unwrap_or_default(),
            });
        }

        stack.push(Frame {
            name,
            remaining: ordered,
            snapshot: state.clone(),
        });

        match advance(&mut stack, &mut state, options) {
            Some(()) => continue,
            None => return Err(last_conflict.unwrap_or(RverseError::Cancelled)),
        }
    }
}

/// Try candidates from the top of the stack, backtracking through earlier
/// frames as each one's candidates are exhausted. Returns `Some(())` once
/// a candidate commits cleanly (leaving `state` updated), or `None` if the
/// whole stack is exhausted.
fn advance(stack: &mut Vec<Frame>, state: &mut SearchState, options: &ResolveOptions) -> Option<()> {
    while let Some(frame) = stack.last_mut() {
        while let Some(candidate) = frame.remaining.pop() {
            let mut trial = frame.snapshot.clone();
            if commit(&mut trial, &frame.name, candidate, options) {
                *state = trial;
                return Some(());
            }
        }
        debug!(name = %frame.name, "backtracking past exhausted frame");
        stack.pop();
    }
    None
}

/// Apply one candidate choice for `name` to `state`, merging its active
/// edges into the open-names map. Returns `false` (leaving `state`
/// unmodified from the caller's point of view, since `state` here is
/// always a fresh trial clone) if an edge targets an already-resolved
/// name whose version doesn't satisfy the edge — this is what catches
/// both true cycles (A depends on B depends on A) and ordering-induced
/// conflicts between two roots.
fn commit(state: &mut SearchState, name: &str, candidate: Candidate, options: &ResolveOptions) -> bool {
    for edge in candidate.active_edges(options.include_optional) {
        if let Some(existing) = state.assignment.get(&edge.name) {
            if !edge.constraint.satisfies(&existing.version) {
                return false;
            }
            continue;
        }

        if !state.package_refs.contains_key(&edge.name) {
            let edge_ref = derive_edge_ref(&candidate.package_ref, &edge.name);
            state.package_refs.insert(edge.name.clone(), edge_ref);
            state.open.insert(edge.name.clone());
        }

        let merged = state
            .constraints
            .get(&edge.name)
            .cloned()
            .unwrap_or_default()
            .merge(&edge.constraint);
        state.contribute(
            &edge.name,
            BlameLink {
                parent: name.to_string(),
                kind: edge.kind,
                constraint: edge.constraint.to_string(),
            },
        );
        state.constraints.insert(edge.name.clone(), merged);
    }

    state.assignment.insert(name.to_string(), candidate);
    true
}

/// Edges resolve against CRAN unless the parent candidate is itself from
/// Bioconductor, in which case they resolve against the same release.
/// GitHub edges are never synthesized.
fn derive_edge_ref(parent: &PackageRef, edge_name: &str) -> PackageRef {
    match parent.bioc_release() {
        Some(release) => PackageRef::bioc(edge_name, release),
        None => PackageRef::cran(edge_name),
    }
}

/// Filter `raw` (already newest-first) down to the candidates that satisfy
/// `constraint` and, if `lock_r` is set, don't exceed it. When every
/// constraint-satisfying candidate exceeds `lock_r`, returns the
/// `RLockUnsatisfiable` error instead of an empty-with-no-explanation list.
fn order_candidates(
    raw: Vec<Candidate>,
    constraint: &Constraint,
    name: &str,
    options: &ResolveOptions,
) -> (Vec<Candidate>, Option<RverseError>) {
    let satisfies_constraint: Vec<Candidate> =
        raw.into_iter().filter(|c| constraint.satisfies(&c.version)).collect();

    let Some(lock_r) = &options.lock_r else {
        return (into_stack_order(satisfies_constraint), None);
    };

    let within_lock: Vec<Candidate> = satisfies_constraint
        .iter()
        .filter(|c| c.r_floor.as_ref().is_none_or(|f| f <= lock_r))
        .cloned()
        .collect();

    if within_lock.is_empty() && !satisfies_constraint.is_empty() {
        let lowest_floor = satisfies_constraint
            .iter()
            .filter_map(|c| c.r_floor.clone())
            .min()
            .unwrap_or_else(|| lock_r.clone());
        return (
            Vec::new(),
            Some(RverseError::RLockUnsatisfiable {
                package: name.to_string(),
                r_floor: lowest_floor.to_string(),
                lock_r: lock_r.to_string(),
            }),
        );
    }

    (into_stack_order(within_lock), None)
}

/// `Frame::remaining` is popped from the back (cheapest for `Vec`), so it
/// must hold candidates in *reverse* preference order.
fn into_stack_order(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.reverse();
    candidates
}

/// Most-constrained-variable heuristic: roots before transitively
/// discovered names, then fewer remaining candidates first, then
/// lexicographic by name.
fn pick_next(
    state: &SearchState,
    root_names: &HashSet<String>,
    provider: &dyn MetadataProvider,
    options: &ResolveOptions,
) -> Result<String, RverseError> {
    let mut best: Option<(bool, usize, String)> = None;
    for name in &state.open {
        let package_ref = &state.package_refs[name];
        let constraint = &state.constraints[name];
        let count = provider
            .candidates(package_ref)?
            .into_iter()
            .filter(|c| constraint.satisfies(&c.version))
            .count();
        let key = (!root_names.contains(name), count, name.clone());
        if best.as_ref().is_none_or(|b| key < *b) {
            best = Some(key);
        }
    }
    Ok(best.expect("open is non-empty").2)
}

fn build_solution(state: SearchState, options: &ResolveOptions) -> Solution {
    let floor_over_selection = state
        .assignment
        .values()
        .filter_map(|c| c.r_floor.clone())
        .max();

    let r_version = match &options.lock_r {
        Some(lock) => lock.clone(),
        None => {
            let mut v = floor_over_selection.clone().unwrap_or_else(zero_version);
            if let Some(current) = &options.current_r {
                if current > &v {
                    v = current.clone();
                }
            }
            v
        }
    };

    let mut downgrades = Vec::new();
    if let Some(current) = &options.current_r {
        match r_version.cmp(current) {
            std::cmp::Ordering::Greater => {
                let mut affected: Vec<_> = state
                    .assignment
                    .values()
                    .filter_map(|candidate| {
                        candidate
                            .r_floor
                            .as_ref()
                            .filter(|floor| *floor > current)
                            .map(|floor| (candidate.package_ref.name.clone(), floor.clone()))
                    })
                    .collect();
                affected.sort_by(|a, b| a.0.cmp(&b.0));
                for (name, floor) in affected {
                    downgrades.push(DowngradeEntry {
                        name,
                        from: current.clone(),
                        to: floor,
                        reason: "requires an R upgrade".to_string(),
                    });
                }
            }
            std::cmp::Ordering::Less => {
                downgrades.push(DowngradeEntry {
                    name: "<r-lock>".to_string(),
                    from: current.clone(),
                    to: r_version.clone(),
                    reason: "R downgraded via an explicit lock".to_string(),
                });
            }
            std::cmp::Ordering::Equal => {}
        }
    }

    let source_summary = SourceSummary::from_assignment(&state.assignment);
    Solution {
        assignment: state.assignment,
        r_version,
        downgrades,
        source_summary,
    }
}

fn zero_version() -> Version {
    Version::parse("0").expect("'0' is a valid version")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Constraint;
    use crate::package::{Edge, PackageRef};
    use crate::provider::fake::FakeProvider;

    fn candidate(
        package_ref: PackageRef,
        version: &str,
        r_floor: Option<&str>,
        depends: Vec<Edge>,
    ) -> Candidate {
        Candidate {
            package_ref,
            version: Version::parse(version).unwrap(),
            r_floor: r_floor.map(|v| Version::parse(v).unwrap()),
            depends,
            bioc_release: None,
        }
    }

    fn edge(name: &str, constraint: &str, kind: EdgeKind) -> Edge {
        Edge {
            name: name.to_string(),
            constraint: Constraint::parse(constraint).unwrap(),
            kind,
        }
    }

    fn req(name: &str, source: Source, constraint: &str) -> Requirement {
        let package_ref = match source {
            Source::Cran => PackageRef::cran(name),
            Source::Bioc => PackageRef::bioc(name, "3.19"),
            Source::Github => PackageRef::github(name.to_string(), None),
        };
        Requirement {
            package_ref,
            constraint: Constraint::parse(constraint).unwrap(),
            optional: false,
        }
    }

    #[test]
    fn cran_only_linear() {
        let provider = FakeProvider::new()
            .with(
                PackageRef::cran("dplyr"),
                vec![candidate(
                    PackageRef::cran("dplyr"),
                    "1.1.4",
                    Some("4.0.0"),
                    vec![edge("rlang", ">=1.1.0", EdgeKind::Imports)],
                )],
            )
            .with(
                PackageRef::cran("rlang"),
                vec![candidate(PackageRef::cran("rlang"), "1.1.3", Some("3.6.0"), vec![])],
            );

        let requirements = vec![req("dplyr", Source::Cran, ">=1.0.0")];
        let solution = resolve(&requirements, &provider, &ResolveOptions::default(), || false).unwrap();

        assert_eq!(solution.assignment.len(), 2);
        assert_eq!(solution.assignment["dplyr"].version.to_string(), "1.1.4");
        assert_eq!(solution.assignment["rlang"].version.to_string(), "1.1.3");
        assert_eq!(solution.r_version.to_string(), "4.0.0");
    }

    #[test]
    fn bioc_release_pin_reports_upgrade() {
        let provider = FakeProvider::new().with(
            PackageRef::bioc("DESeq2", "3.19"),
            vec![candidate(PackageRef::bioc("DESeq2", "3.19"), "1.42.0", Some("4.4.0"), vec![])],
        );
        let requirements = vec![req("DESeq2", Source::Bioc, "")];
        let options = ResolveOptions {
            current_r: Some(Version::parse("4.2.2").unwrap()),
            ..Default::default()
        };
        let solution = resolve(&requirements, &provider, &options, || false).unwrap();

        assert!(solution.r_version >= Version::parse("4.4").unwrap());
        assert_eq!(solution.downgrades.len(), 1);
        assert_eq!(solution.downgrades[0].name, "DESeq2");
    }

    #[test]
    fn backtrack_required() {
        let provider = FakeProvider::new()
            .with(
                PackageRef::cran("A"),
                vec![
                    candidate(PackageRef::cran("A"), "2.0", None, vec![edge("B", ">=2.0", EdgeKind::Depends)]),
                    candidate(PackageRef::cran("A"), "1.0", None, vec![edge("B", ">=1.0", EdgeKind::Depends)]),
                ],
            )
            .with(
                PackageRef::cran("B"),
                vec![
                    candidate(PackageRef::cran("B"), "2.0", None, vec![]),
                    candidate(PackageRef::cran("B"), "1.0", None, vec![]),
                ],
            );

        let requirements = vec![req("A", Source::Cran, ""), req("B", Source::Cran, "==1.0")];
        let solution = resolve(&requirements, &provider, &ResolveOptions::default(), || false).unwrap();

        assert_eq!(solution.assignment["A"].version.to_string(), "1.0");
        assert_eq!(solution.assignment["B"].version.to_string(), "1.0");
    }

    #[test]
    fn unsolvable_conflict_carries_chain() {
        let provider = FakeProvider::new()
            .with(
                PackageRef::cran("A"),
                vec![candidate(PackageRef::cran("A"), "1.0", None, vec![edge("B", "==1.0", EdgeKind::Depends)])],
            )
            .with(
                PackageRef::cran("B"),
                vec![
                    candidate(PackageRef::cran("B"), "2.0", None, vec![]),
                    candidate(PackageRef::cran("B"), "1.0", None, vec![]),
                ],
            );

        let requirements = vec![req("A", Source::Cran, "==1.0"), req("B", Source::Cran, "==2.0")];
        let err = resolve(&requirements, &provider, &ResolveOptions::default(), || false).unwrap_err();

        match err {
            RverseError::VersionConflict { name, chain, .. } => {
                assert_eq!(name, "B");
                assert!(chain.iter().any(|b| b.parent == "A"));
                assert!(chain.iter().any(|b| b.parent == "<project>"));
            }
            other => panic!("expected VersionConflict, got {other:?}"),
        }
    }

    #[test]
    fn r_lock_unsatisfiable() {
        let provider = FakeProvider::new().with(
            PackageRef::cran("A"),
            vec![candidate(PackageRef::cran("A"), "1.0", Some("4.2.0"), vec![])],
        );
        let requirements = vec![req("A", Source::Cran, "")];
        let options = ResolveOptions {
            lock_r: Some(Version::parse("4.1.0").unwrap()),
            ..Default::default()
        };
        let err = resolve(&requirements, &provider, &options, || false).unwrap_err();
        assert!(matches!(err, RverseError::RLockUnsatisfiable { .. }));
    }

    #[test]
    fn source_conflict_on_roots() {
        let provider = FakeProvider::new();
        let requirements = vec![req("readr", Source::Cran, ""), req("readr", Source::Github, "")];
        let err = resolve(&requirements, &provider, &ResolveOptions::default(), || false).unwrap_err();
        assert!(matches!(err, RverseError::SourceConflict { .. }));
    }

    #[test]
    fn empty_targets_yield_empty_solution() {
        let provider = FakeProvider::new();
        let solution = resolve(&[], &provider, &ResolveOptions::default(), || false).unwrap();
        assert!(solution.assignment.is_empty());
    }

    #[test]
    fn single_target_no_deps() {
        let provider = FakeProvider::new().with(
            PackageRef::cran("A"),
            vec![candidate(PackageRef::cran("A"), "1.0", None, vec![])],
        );
        let requirements = vec![req("A", Source::Cran, "")];
        let solution = resolve(&requirements, &provider, &ResolveOptions::default(), || false).unwrap();
        assert_eq!(solution.assignment.len(), 1);
    }

    #[test]
    fn satisfiable_cycle_resolves() {
        let provider = FakeProvider::new()
            .with(
                PackageRef::cran("A"),
                vec![candidate(PackageRef::cran("A"), "1.0", None, vec![edge("B", ">=1.0", EdgeKind::Depends)])],
            )
            .with(
                PackageRef::cran("B"),
                vec![candidate(PackageRef::cran("B"), "1.0", None, vec![edge("A", ">=1.0", EdgeKind::Depends)])],
            );
        let requirements = vec![req("A", Source::Cran, "")];
        let solution = resolve(&requirements, &provider, &ResolveOptions::default(), || false).unwrap();
        assert_eq!(solution.assignment.len(), 2);
    }

    #[test]
    fn unsatisfiable_cycle_conflicts_without_looping() {
        let provider = FakeProvider::new()
            .with(
                PackageRef::cran("A"),
                vec![candidate(PackageRef::cran("A"), "1.0", None, vec![edge("B", "==2.0", EdgeKind::Depends)])],
            )
            .with(
                PackageRef::cran("B"),
                vec![candidate(PackageRef::cran("B"), "1.0", None, vec![edge("A", "==1.0", EdgeKind::Depends)])],
            );
        let requirements = vec![req("A", Source::Cran, "")];
        let err = resolve(&requirements, &provider, &ResolveOptions::default(), || false).unwrap_err();
        assert!(matches!(err, RverseError::VersionConflict { .. } | RverseError::UnknownPackage { .. }));
    }

    #[test]
    fn deterministic_across_runs() {
        let provider = FakeProvider::new()
            .with(
                PackageRef::cran("A"),
                vec![candidate(PackageRef::cran("A"), "1.0", None, vec![edge("B", ">=1.0", EdgeKind::Depends)])],
            )
            .with(
                PackageRef::cran("B"),
                vec![candidate(PackageRef::cran("B"), "1.0", None, vec![])],
            );
        let requirements = vec![req("A", Source::Cran, "")];
        let a = resolve(&requirements, &provider, &ResolveOptions::default(), || false).unwrap();
        let b = resolve(&requirements, &provider, &ResolveOptions::default(), || false).unwrap();
        assert_eq!(a.assignment["A"].version, b.assignment["A"].version);
        assert_eq!(a.assignment["B"].version, b.assignment["B"].version);
        assert_eq!(a.r_version, b.r_version);
    }

    #[test]
    fn cancellation_is_observed() {
        let provider = FakeProvider::new().with(
            PackageRef::cran("A"),
            vec![candidate(PackageRef::cran("A"), "1.0", None, vec![])],
        );
        let requirements = vec![req("A", Source::Cran, "")];
        let err = resolve(&requirements, &provider, &ResolveOptions::default(), || true).unwrap_err();
        assert!(matches!(err, RverseError::Cancelled));
    }
}
