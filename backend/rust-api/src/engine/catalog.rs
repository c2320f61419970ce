//! Built-in question catalog: 8 pillars x 5 questions x 5 options.
//!
//! Options are listed from weakest to strongest position; option `i` scores
//! `i / 4`.

use crate::engine::pillar::Pillar;
use crate::models::question::{AnswerOption, PillarQuestions, Question, QuestionBank};

type Scale = [&'static str; 5];

const AGREEMENT: Scale = [
    "Strongly disagree",
    "Disagree",
    "Neutral",
    "Agree",
    "Strongly agree",
];
const AGREEMENT_REVERSED: Scale = [
    "Strongly agree",
    "Agree",
    "Neutral",
    "Disagree",
    "Strongly disagree",
];
const FREQUENCY: Scale = ["Never", "Rarely", "Sometimes", "Usually", "Always"];
const FREQUENCY_REVERSED: Scale = ["Always", "Usually", "Sometimes", "Rarely", "Never"];
const REVIEW_CADENCE: Scale = [
    "Never",
    "Once a year",
    "Every few months",
    "Monthly",
    "Weekly",
];
const CONFIDENCE: Scale = [
    "Not at all confident",
    "Slightly confident",
    "Somewhat confident",
    "Very confident",
    "Completely confident",
];
const TREND: Scale = [
    "Decreased a lot",
    "Decreased slightly",
    "Stayed about the same",
    "Increased slightly",
    "Increased a lot",
];

const DEFAULT_QUESTIONS: [(Pillar, [(&str, Scale); 5]); 8] = [
    (
        Pillar::Awareness,
        [
            ("I know my total monthly take-home income.", AGREEMENT),
            ("I know how much I spend each month and on what.", AGREEMENT),
            (
                "I know my current net worth (what I own minus what I owe).",
                AGREEMENT,
            ),
            (
                "How often do you review your bank and card statements?",
                REVIEW_CADENCE,
            ),
            (
                "I understand the interest rates and fees on my accounts and debts.",
                AGREEMENT,
            ),
        ],
    ),
    (
        Pillar::Goals,
        [
            ("I have written down specific financial goals.", AGREEMENT),
            ("My goals have target amounts and deadlines.", AGREEMENT),
            (
                "How far ahead does your financial planning reach?",
                [
                    "I don't plan ahead",
                    "The next month",
                    "The next year",
                    "The next five years",
                    "Retirement and beyond",
                ],
            ),
            (
                "How often do you track progress toward your goals?",
                REVIEW_CADENCE,
            ),
            (
                "How confident are you that you will reach your most important financial goal?",
                CONFIDENCE,
            ),
        ],
    ),
    (
        Pillar::Habits,
        [
            ("I follow a monthly budget.", FREQUENCY),
            ("I pay my bills on time.", FREQUENCY),
            (
                "I set money aside for savings before I spend on anything else.",
                FREQUENCY,
            ),
            (
                "I compare prices and wait before making large purchases.",
                FREQUENCY,
            ),
            ("I pay my credit card balance in full each month.", FREQUENCY),
        ],
    ),
    (
        Pillar::Mindsets,
        [
            ("I feel in control of my finances.", AGREEMENT),
            (
                "I believe my own actions can improve my financial situation.",
                AGREEMENT,
            ),
            ("Thinking about money causes me stress.", AGREEMENT_REVERSED),
            (
                "I spend money to keep up with the people around me.",
                AGREEMENT_REVERSED,
            ),
            (
                "I am comfortable talking about money with my family or partner.",
                AGREEMENT,
            ),
        ],
    ),
    (
        Pillar::Assets,
        [
            (
                "How many months of essential expenses could your emergency fund cover?",
                [
                    "None",
                    "Less than 1 month",
                    "1 to 2 months",
                    "3 to 5 months",
                    "6 months or more",
                ],
            ),
            (
                "What share of your income goes to retirement savings?",
                [
                    "Nothing",
                    "Less than 3%",
                    "3% to 5%",
                    "6% to 10%",
                    "More than 10%",
                ],
            ),
            (
                "My savings and investments are spread across different types of assets.",
                AGREEMENT,
            ),
            (
                "I have adequate insurance (health, life, property) for my situation.",
                AGREEMENT,
            ),
            ("How has your net worth changed over the past year?", TREND),
        ],
    ),
    (
        Pillar::Liabilities,
        [
            (
                "What share of your monthly income goes to debt payments, excluding a mortgage?",
                [
                    "More than 40%",
                    "30% to 40%",
                    "20% to 29%",
                    "10% to 19%",
                    "Less than 10% or no debt",
                ],
            ),
            (
                "I carry a balance on high-interest debt such as credit cards or payday loans.",
                FREQUENCY_REVERSED,
            ),
            ("I have a plan to pay off each of my debts.", AGREEMENT),
            (
                "How many debt payments have you missed or paid late in the past year?",
                [
                    "More than 5",
                    "3 to 5",
                    "2",
                    "1",
                    "None",
                ],
            ),
            ("I know my credit score and what affects it.", AGREEMENT),
        ],
    ),
    (
        Pillar::Income,
        [
            (
                "How stable is your main source of income?",
                [
                    "Very unstable",
                    "Somewhat unstable",
                    "Neither stable nor unstable",
                    "Somewhat stable",
                    "Very stable",
                ],
            ),
            (
                "How many sources of income do you have?",
                [
                    "None",
                    "One, and it is at risk",
                    "One stable source",
                    "Two sources",
                    "Three or more sources",
                ],
            ),
            ("My income covers my essential living costs.", AGREEMENT),
            (
                "I am actively building skills that could increase my income.",
                AGREEMENT,
            ),
            ("How has your income changed over the past two years?", TREND),
        ],
    ),
    (
        Pillar::Expenses,
        [
            ("At the end of the month I have money left over.", FREQUENCY),
            (
                "What share of your income goes to housing costs?",
                [
                    "More than 50%",
                    "41% to 50%",
                    "31% to 40%",
                    "25% to 30%",
                    "Less than 25%",
                ],
            ),
            (
                "How often do you review your subscriptions and recurring charges?",
                REVIEW_CADENCE,
            ),
            ("I make purchases that I later regret.", FREQUENCY_REVERSED),
            (
                "I plan ahead for irregular costs such as car repairs, gifts and annual fees.",
                FREQUENCY,
            ),
        ],
    ),
];

pub fn default_bank() -> QuestionBank {
    let pillars = DEFAULT_QUESTIONS
        .iter()
        .map(|(pillar, questions)| PillarQuestions {
            pillar: *pillar,
            questions: questions
                .iter()
                .enumerate()
                .map(|(q_idx, (text, scale))| build_question(*pillar, q_idx, text, scale))
                .collect(),
        })
        .collect();

    QuestionBank { pillars }
}

fn build_question(pillar: Pillar, index: usize, text: &str, scale: &Scale) -> Question {
    let id = format!("{}-q{}", pillar, index + 1);
    let last = (scale.len() - 1) as f64;
    let options = scale
        .iter()
        .enumerate()
        .map(|(o_idx, label)| AnswerOption {
            id: format!("{}-o{}", id, o_idx + 1),
            text: (*label).to_string(),
            score: o_idx as f64 / last,
        })
        .collect();

    Question {
        id,
        text: text.to_string(),
        options,
    }
}
