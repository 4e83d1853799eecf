/*!

This is the long-form manual for `fraud_analysis` and `vaudit`.

## Input format

The auditor consumes a plain-text log, one event per line. A line is a vote
record if and only if it contains the literal marker `candidate:`. Every
other line is ignored. Within a qualifying line, three labeled fields are
extracted, in any order:

```text
ip: 203.0.113.7, candidate: Jon Smith, time: 2024-03-01T10:00:00Z
```

* `ip:` the submitting address, kept as an opaque string;
* `candidate:` the raw candidate spelling, trimmed;
* `time:` the vote timestamp. RFC 3339 is accepted, as well as the naive
  forms `2024-03-01 10:00:00` and `2024-03-01T10:00:00` (read as UTC).

A line missing the candidate or time field, or carrying an unparseable
timestamp, is dropped and counted, never an error. A missing `ip:` field
yields an empty address.

## Name consolidation

Raw spellings are grouped into canonical identities, most frequent spelling
first so that the dominant spelling becomes the canonical. Two policies are
available:

* `editDistance` (default): names are folded to lowercase ASCII letters and
  merged when their Levenshtein distance is at most 2;
* `foldedPrefix`: names sharing the same folded 8-character prefix are
  merged. This is the historical behavior, kept selectable.

## Scoring

Each consolidated candidate is scored by an ordered, additive rule list.
The default rules and weights:

| rule | condition | weight |
|------|-----------|--------|
| single IP | all votes from one IP, more than 2 votes | 1000 |
| concentration | one IP above 80% of more than 10 votes | 800 |
|  | or more than 50 votes from one IP | 500 |
| burst | more than 20 votes within 120 seconds | 600 |
|  | or more than 10 votes within 60 seconds | 400 |
| clustering | densest 5% window holds over 70% of more than 15 votes | 300 |
| rate | more than 30 votes per distinct IP | 200 |

Candidates listed in `exemptCandidates` are never scored. Candidates with a
zero score are not suspicious. The two highest-scored candidates are named
as fraud; everyone else is ranked by corrected vote count.

## Report

The report has two sections: the fraud candidates, each with its corrected
vote count, score and the triggered reasons, and the clean ranking of the
top 20 remaining candidates. With `--out`, a JSON summary is also written;
with `--reference`, the summary is compared against a reference file and
the run fails on any difference.

*/
