// Content hashes depend on what a card says, not how its YAML is laid out.

use std::fs;

use rc_cards::{load_corpus, LoadOptions};
use tempfile::TempDir;

const BLOCK_STYLE: &str = "\
id: DOCKER-USER-001
title: Run containers as a non-root user
severity: high
scope: dockerfile
requirement: Every image must switch to a non-root USER before ENTRYPOINT.
do:
  - Add a USER instruction with a fixed UID
dont:
  - Rely on the base image default user
detect:
  hadolint:
    - DL3002
  semgrep:
    - dockerfile-root-user
verify:
  tests:
    - Image metadata reports a non-zero UID
refs:
  cis: ['4.1']
";

const FLOW_STYLE: &str = "\
# Same card, different layout and key order.
refs: { cis: [\"4.1\"] }
verify: { tests: [Image metadata reports a non-zero UID] }
detect: { semgrep: [dockerfile-root-user], hadolint: [DL3002] }
dont: [Rely on the base image default user]
do: [Add a USER instruction with a fixed UID]
requirement: >-
  Every image must switch to a non-root USER before ENTRYPOINT.
scope: dockerfile
severity: high
title: \"Run containers as a non-root user\"
id: DOCKER-USER-001
";

fn hash_of(source: &str) -> String {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("card.yaml"), source).unwrap();
    let load = load_corpus(dir.path(), &LoadOptions::default()).unwrap();
    assert!(load.is_clean(), "{:?}", load.errors);
    load.corpus.get("DOCKER-USER-001").unwrap().content_hash.clone()
}

#[test]
fn layout_does_not_change_the_hash() {
    assert_eq!(hash_of(BLOCK_STYLE), hash_of(FLOW_STYLE));
}

#[test]
fn content_does_change_the_hash() {
    let edited = BLOCK_STYLE.replace("severity: high", "severity: critical");
    assert_ne!(hash_of(BLOCK_STYLE), hash_of(&edited));
}
