//! Example demonstrating parsing various atoms and deriving their restrictions

use ebuild_atom::{Atom, AtomParser, Eapi};

fn show(atom: &Atom) {
    println!("   Input: {}", atom.text());
    println!("   Key: {}", atom.key());
    if let Some(blocker) = atom.blocker() {
        println!("   Blocker: {:?}", blocker);
    }
    if let Some(op) = atom.op() {
        println!("   Operator: {}", op);
        println!("   Version: {}", atom.fullver().unwrap_or_default());
    }
    if let Some(slots) = atom.slot() {
        println!("   Slots: {:?} {:?}", slots, atom.slot_operator());
    }
    if let Some(repo_id) = atom.repo_id() {
        println!("   Repository: {}", repo_id);
    }
    if let Some(use_deps) = atom.use_deps() {
        println!("   USE: {:?} ({:?})", use_deps, atom.use_style());
    }
    match atom.restrictions() {
        Ok(restrictions) => {
            println!("   Restrictions:");
            for restriction in restrictions {
                println!("     - {:?}", restriction);
            }
        }
        Err(e) => println!("   Restrictions: {}", e),
    }
    println!("   Output: {}\n", atom);
}

fn main() {
    println!("Atom Parser Examples\n");

    let inputs = [
        "dev-lang/rust",
        ">=dev-lang/rust-1.75.0-r1",
        "=dev-lang/python-3.11*",
        "~dev-libs/openssl-3.0.13",
        "dev-lang/rust:0/1.75=",
        "dev-lang/python:3.11,3.12",
        "dev-lang/rust[llvm_targets_AMDGPU,-debug]",
        "!!dev-lang/rust",
        ">=dev-lang/rust-1.75.0:0::gentoo[llvm_targets_AMDGPU]",
    ];
    for (i, input) in inputs.iter().enumerate() {
        println!("{}. {}", i + 1, input);
        match Atom::parse(input) {
            Ok(atom) => show(&atom),
            Err(e) => println!("   Error: {}\n", e),
        }
    }

    println!("Conditional USE deps:");
    let atom = Atom::parse("dev-libs/foo[ssl?,!debug?,gtk=]").expect("Failed to parse atom");
    show(&atom);
    let resolved = atom
        .evaluate_conditionals(["ssl", "gtk"])
        .expect("Failed to resolve use deps");
    show(&resolved);

    println!("EAPI checks:");
    let parser = AtomParser::new().eapi(Eapi::Numbered(2));
    for input in ["dev-lang/python:2.7[ssl]", "dev-lang/python:2.7,3.1", "!!dev-lang/python"] {
        match parser.parse(input) {
            Ok(atom) => println!("   {} -> ok", atom),
            Err(e) => println!("   {}", e),
        }
    }
}
