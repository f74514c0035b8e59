//! Extraction scenarios against realistic PubMed and INSDSeq records.

use core_exec::execute;
use core_parse::{BuildOptions, build_tree};
use core_query::compile;

const PUBMED_ONE: &str = "<PubmedArticle>\
<MedlineCitation>\
<PMID Version=\"1\">6301692</PMID>\
<Article>\
<ArticleTitle>Site-specific relaxation and recombination by the Tn3 resolvase.</ArticleTitle>\
<AuthorList>\
<Author><LastName>Krasnow</LastName><ForeName>Mark A</ForeName><Initials>MA</Initials></Author>\
<Author><LastName>Cozzarelli</LastName><ForeName>Nicholas R</ForeName><Initials>NR</Initials></Author>\
</AuthorList>\
</Article>\
</MedlineCitation>\
</PubmedArticle>";

const PUBMED_TWO: &str = "<PubmedArticle>\
<MedlineCitation>\
<PMID Version=\"1\">6271474</PMID>\
<Article>\
<ArticleTitle>mRNA in the mammalian central nervous system.</ArticleTitle>\
<AuthorList>\
<Author><LastName>Sutcliffe</LastName><Initials>JG</Initials></Author>\
</AuthorList>\
</Article>\
</MedlineCitation>\
</PubmedArticle>";

const INSDSEQ: &str = "<INSDSeq>\
<INSDSeq_locus>AAQ05867</INSDSeq_locus>\
<INSDSeq_length>109</INSDSeq_length>\
<INSDSeq_accession-version>AAQ05867.1</INSDSeq_accession-version>\
<INSDSeq_feature-table>\
<INSDFeature><INSDFeature_key>source</INSDFeature_key></INSDFeature>\
<INSDFeature><INSDFeature_key>Protein</INSDFeature_key></INSDFeature>\
<INSDFeature>\
<INSDFeature_key>mat_peptide</INSDFeature_key>\
<INSDFeature_intervals>\
<INSDInterval>\
<INSDInterval_from>41</INSDInterval_from>\
<INSDInterval_to>67</INSDInterval_to>\
<INSDInterval_accession>AAQ05867.1</INSDInterval_accession>\
</INSDInterval>\
</INSDFeature_intervals>\
</INSDFeature>\
<INSDFeature><INSDFeature_key>CDS</INSDFeature_key></INSDFeature>\
</INSDSeq_feature-table>\
</INSDSeq>";

fn run(args: &[&str], record: &str) -> String {
    let argv: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let program = compile(&argv).unwrap();
    let tree = build_tree(record, &BuildOptions::default(), 256).unwrap();
    execute(&program, &tree)
}

#[test]
fn basic_element_extraction_with_author_blocks() {
    let args = [
        "-pattern",
        "PubmedArticle",
        "-element",
        "MedlineCitation/PMID",
        "-block",
        "Author",
        "-sep",
        " ",
        "-element",
        "Initials,LastName",
    ];
    assert_eq!(
        run(&args, PUBMED_ONE),
        "6301692\tMA Krasnow\tNR Cozzarelli\n"
    );
    assert_eq!(run(&args, PUBMED_TWO), "6271474\tJG Sutcliffe\n");
}

#[test]
fn conditional_with_numeric_bound_on_feature_count() {
    let args = [
        "-pattern",
        "INSDSeq",
        "-if",
        "#INSDFeature",
        "-ge",
        "3",
        "-element",
        "INSDSeq_accession-version",
    ];
    // The sample has exactly 4 features.
    assert_eq!(run(&args, INSDSEQ), "AAQ05867.1\n");

    let strict = [
        "-pattern",
        "INSDSeq",
        "-if",
        "#INSDFeature",
        "-ge",
        "5",
        "-element",
        "INSDSeq_accession-version",
    ];
    assert_eq!(run(&strict, INSDSEQ), "");
}

#[test]
fn variable_capture_and_reuse_across_blocks() {
    let args = [
        "-pattern",
        "PubmedArticle",
        "-ACC",
        "MedlineCitation/PMID",
        "-block",
        "Author",
        "-pfc",
        "\\n",
        "-element",
        "&ACC",
        "Initials,LastName",
    ];
    assert_eq!(
        run(&args, PUBMED_ONE),
        "\n6301692\tMA\tKrasnow\n6301692\tNR\tCozzarelli\n"
    );
}

#[test]
fn ucsc_coordinate_rewrite_shifts_start_only() {
    let args = [
        "-pattern",
        "INSDInterval",
        "-ucsc-based",
        "INSDInterval_from",
        "INSDInterval_to",
    ];
    let interval = "<INSDInterval>\
<INSDInterval_from>41</INSDInterval_from>\
<INSDInterval_to>67</INSDInterval_to>\
</INSDInterval>";
    assert_eq!(run(&args, interval), "40\t67\n");
}

#[test]
fn zero_and_one_based_rewrites() {
    let interval = "<INSDInterval>\
<INSDInterval_from>41</INSDInterval_from>\
<INSDInterval_to>67</INSDInterval_to>\
</INSDInterval>";
    assert_eq!(
        run(
            &["-pattern", "INSDInterval", "-0-based", "INSDInterval_from", "INSDInterval_to"],
            interval
        ),
        "40\t66\n"
    );
    assert_eq!(
        run(
            &["-pattern", "INSDInterval", "-1-based", "INSDInterval_from", "INSDInterval_to"],
            interval
        ),
        "41\t67\n"
    );
}

#[test]
fn first_last_and_position() {
    assert_eq!(
        run(
            &["-pattern", "PubmedArticle", "-first", "LastName"],
            PUBMED_ONE
        ),
        "Krasnow\n"
    );
    assert_eq!(
        run(
            &["-pattern", "PubmedArticle", "-last", "LastName"],
            PUBMED_ONE
        ),
        "Cozzarelli\n"
    );
    assert_eq!(
        run(
            &[
                "-pattern",
                "PubmedArticle",
                "-block",
                "Author",
                "-position",
                "last",
                "-element",
                "LastName"
            ],
            PUBMED_ONE
        ),
        "Cozzarelli\n"
    );
}

#[test]
fn def_placeholder_fills_missing_values() {
    let args = [
        "-pattern",
        "PubmedArticle",
        "-def",
        "-",
        "-element",
        "MedlineCitation/PMID",
        "Journal",
    ];
    assert_eq!(run(&args, PUBMED_ONE), "6301692\t-\n");
}

#[test]
fn else_branch_runs_when_condition_fails() {
    let args = [
        "-pattern",
        "PubmedArticle",
        "-block",
        "Author",
        "-if",
        "Affiliation",
        "-element",
        "LastName",
        "-else",
        "-lbl",
        "unaffiliated",
    ];
    assert_eq!(run(&args, PUBMED_ONE), "unaffiliated\n");
}

#[test]
fn attribute_extraction() {
    let args = ["-pattern", "PubmedArticle", "-element", "PMID@Version"];
    assert_eq!(run(&args, PUBMED_ONE), "1\n");
}

#[test]
fn num_len_and_index_ops() {
    assert_eq!(
        run(&["-pattern", "PubmedArticle", "-num", "Author"], PUBMED_ONE),
        "2\n"
    );
    assert_eq!(
        run(
            &["-pattern", "INSDSeq", "-len", "INSDSeq_locus"],
            INSDSEQ
        ),
        "8\n"
    );
    assert_eq!(
        run(
            &[
                "-pattern",
                "PubmedArticle",
                "-block",
                "Author",
                "-index",
                "LastName"
            ],
            PUBMED_ONE
        ),
        "1\t2\n"
    );
}

#[test]
fn empty_parentheses_set_a_variable_that_tests_true() {
    let args = [
        "-pattern",
        "PubmedArticle",
        "-FLAG",
        "()",
        "-block",
        "Author",
        "-if",
        "&FLAG",
        "-element",
        "LastName",
    ];
    assert_eq!(run(&args, PUBMED_ONE), "Krasnow\tCozzarelli\n");

    let unset = [
        "-pattern",
        "PubmedArticle",
        "-FLAG",
        "",
        "-block",
        "Author",
        "-if",
        "&FLAG",
        "-element",
        "LastName",
    ];
    assert_eq!(run(&unset, PUBMED_ONE), "");
}

#[test]
fn upper_and_terms_transforms() {
    assert_eq!(
        run(
            &["-pattern", "PubmedArticle", "-upper", "Initials"],
            PUBMED_TWO
        ),
        "JG\n"
    );
    let terms = run(
        &["-pattern", "PubmedArticle", "-sep", "|", "-terms", "ArticleTitle"],
        PUBMED_TWO
    );
    assert_eq!(terms, "mRNA|in|the|mammalian|central|nervous|system\n");
}
